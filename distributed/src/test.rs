#![cfg(test)]

use std::{
    sync::{Arc, Mutex},
    thread,
};

use comms::{Communicator, LocalGroup};
use ml_core::{
    DataType, Device, GradientValue, Learner, MinibatchInfo, Parameter, Tensor, find_gradient,
};

/// Runs `f` once per worker of a fresh local group, each on its own thread.
pub fn run_workers<F, T>(size: usize, f: F) -> Vec<T>
where
    F: Fn(Arc<dyn Communicator>) -> T + Sync,
    T: Send,
{
    let _ = env_logger::builder().is_test(true).try_init();
    let communicators = LocalGroup::create(size).unwrap();

    thread::scope(|s| {
        let handles: Vec<_> = communicators
            .into_iter()
            .map(|comm| {
                let f = &f;
                s.spawn(move || f(Arc::new(comm)))
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

pub fn single_worker() -> Arc<dyn Communicator> {
    Arc::new(LocalGroup::create(1).unwrap().remove(0))
}

pub fn param(name: &str, values: &[f32]) -> Parameter {
    let tensor = Tensor::from_f32_vec(&[values.len()], values.to_vec(), Device::Cpu).unwrap();
    Parameter::new(name, tensor)
}

pub fn gradient(parameter: &Parameter, values: &[f32]) -> GradientValue {
    let tensor = Tensor::from_f32_vec(&[values.len()], values.to_vec(), Device::Cpu).unwrap();
    GradientValue::new(parameter.clone(), tensor)
}

pub fn minibatch(samples: usize, loss: f64, criterion: f64) -> MinibatchInfo {
    MinibatchInfo::new(
        samples,
        Tensor::scalar(loss, DataType::Float, Device::Cpu),
        Tensor::scalar(criterion, DataType::Float, Device::Cpu),
    )
}

/// A learner stepping by the raw gradient and recording what it received.
#[derive(Clone)]
pub struct RecordingLearner {
    parameters: Vec<Parameter>,
    records: Arc<Mutex<Vec<(Vec<f64>, usize)>>>,
    resets: Arc<Mutex<usize>>,
    stop: bool,
}

impl RecordingLearner {
    pub fn new(parameters: Vec<Parameter>) -> Self {
        Self {
            parameters,
            records: Arc::default(),
            resets: Arc::default(),
            stop: false,
        }
    }

    /// Makes every update report that training should stop.
    pub fn stopping(mut self) -> Self {
        self.stop = true;
        self
    }

    /// The concatenated gradients and sample count of every applied update.
    pub fn records(&self) -> Vec<(Vec<f64>, usize)> {
        self.records.lock().unwrap().clone()
    }

    pub fn resets(&self) -> usize {
        *self.resets.lock().unwrap()
    }
}

impl Learner for RecordingLearner {
    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn update(
        &mut self,
        gradients: &[GradientValue],
        sample_count: usize,
        _sweep_end: bool,
    ) -> ml_core::Result<bool> {
        if sample_count == 0 {
            return Ok(false);
        }

        let mut received = vec![];
        for parameter in &self.parameters {
            let grad = find_gradient(gradients, parameter)?;
            received.extend(grad.values());
            parameter.value_mut().scaled_add(-1., grad)?;
        }

        self.records.lock().unwrap().push((received, sample_count));
        Ok(!self.stop)
    }

    fn reset_smoothed_gradients(&mut self) {
        *self.resets.lock().unwrap() += 1;
    }

    fn total_samples_seen(&self) -> usize {
        self.records.lock().unwrap().iter().map(|(_, n)| n).sum()
    }
}
