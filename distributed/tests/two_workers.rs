use std::{sync::Arc, thread};

use comms::{Communicator, LocalGroup};
use distributed::{DistributedLearnerBuilder, DistributedLearnerSpec};
use machine_learning::{
    LearningRateUnit,
    specs::{LearnerBuilder, OptimizerSpec},
};
use ml_core::{DataType, Device, GradientValue, Learners, MinibatchInfo, Parameter, Tensor};

fn scalar(value: f64) -> Tensor {
    Tensor::scalar(value, DataType::Float, Device::Cpu)
}

#[test]
fn two_workers_apply_the_summed_gradient() {
    let _ = env_logger::builder().is_test(true).try_init();
    let spec: DistributedLearnerSpec = serde_json::from_str(r#"{ "kind": "data_parallel" }"#).unwrap();

    let communicators = LocalGroup::create(2).unwrap();
    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = communicators
            .into_iter()
            .map(|comm| {
                s.spawn(move || {
                    let rank = comm.current_worker().global_rank;
                    let w = Parameter::new("w", scalar(0.));

                    let optimizer = OptimizerSpec::GradientDescent { learning_rate: 1. };
                    let local = LearnerBuilder::new(LearningRateUnit::PerSample)
                        .build(&optimizer, vec![w.clone()])
                        .unwrap();

                    let communicator: Arc<dyn Communicator> = Arc::new(comm);
                    let mut learner = DistributedLearnerBuilder::new()
                        .build(&spec, communicator, Learners::new(vec![local]).unwrap())
                        .unwrap();

                    let local_gradient = if rank == 0 { 1. } else { 3. };
                    let mut gradients = vec![GradientValue::new(w.clone(), scalar(local_gradient))];
                    let mut info = MinibatchInfo::new(5, scalar(0.5), scalar(1.));

                    let outcome = learner.update(&mut gradients, &mut info).unwrap();
                    let parameter = w.value().scalar_value().unwrap();

                    (outcome, gradients[0].gradient.values(), info.number_of_samples, parameter)
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (outcome, gradient, samples, parameter) in results {
        assert_eq!(gradient, vec![4.]);
        assert_eq!(samples, 10);
        assert_eq!(outcome.total_samples_seen, 10);
        assert!(outcome.continue_training);
        assert_eq!(parameter, -4.);
    }
}
