use log::debug;
use ml_core::{DataType, MlErr, Tensor};
use rayon::prelude::*;

use crate::{
    Communicator, QuantizationSpec, Result, WorkerDescriptor, WorkerSet,
    quantization::{Quantizer, stripe},
};

/// A communicator able to sum quantized contributions with error feedback.
pub trait QuantizedCommunicator: Communicator {
    /// Replaces every tensor with the cross-worker sum of quantized contributions.
    ///
    /// Each worker quantizes `value + residual` and keeps the quantization error
    /// in `residual` for the next call.
    ///
    /// # Arguments
    /// * `values` - The local contributions, overwritten with the sums.
    /// * `residuals` - One residual per value, same shape and data type.
    /// * `workers` - The participants, must be the whole group.
    ///
    /// # Returns
    /// An error if the residuals don't match the values or the collective fails.
    fn quantized_aggregate_in_place(
        &self,
        values: &mut [&mut Tensor],
        residuals: &mut [Tensor],
        workers: &WorkerSet,
    ) -> Result<()>;
}

/// Adds quantized aggregation on top of any exact `Communicator`.
///
/// Every tensor is split into one contiguous stripe per worker and each stripe is
/// quantized on its own. The reconstructed contributions are summed through the
/// wrapped communicator.
pub struct QuantizingCommunicator<C> {
    inner: C,
    spec: QuantizationSpec,
    quantizer: Quantizer,
}

impl<C: Communicator> QuantizingCommunicator<C> {
    /// Creates a new `QuantizingCommunicator`.
    ///
    /// # Arguments
    /// * `inner` - The communicator that sums the reconstructed contributions.
    /// * `spec` - How values are quantized.
    ///
    /// # Returns
    /// A new `QuantizingCommunicator` or an error if the spec is invalid.
    pub fn new(inner: C, spec: QuantizationSpec) -> Result<Self> {
        let quantizer = Quantizer::new(&spec)?;

        Ok(Self {
            inner,
            spec,
            quantizer,
        })
    }

    pub fn spec(&self) -> &QuantizationSpec {
        &self.spec
    }

    /// Replaces `value` with its quantized contribution and updates `residual`.
    ///
    /// # Returns
    /// The payload size of the contribution in bits.
    fn encode(&self, value: &mut Tensor, residual: &mut Tensor) -> Result<u64> {
        value.add_assign(residual)?;
        let input = value.values();

        let element_bits = match value.data_type() {
            DataType::Float => 32,
            DataType::Double => 64,
        };

        let workers = self.inner.workers().len();
        let own_rank = self.inner.current_worker().global_rank;

        let mut contribution = Vec::with_capacity(input.len());
        let mut payload_bits = 0;

        for rank in 0..workers {
            let range = stripe(input.len(), workers, rank);
            let slice = &input[range];

            if rank == own_rank && !self.spec.use_quantization_for_self_stripe {
                contribution.extend_from_slice(slice);
                continue;
            }

            let quantized = self.quantizer.quantize(slice, element_bits);
            payload_bits += quantized.payload_bits();
            contribution.extend(quantized.dequantize());
        }

        value.assign_values(&contribution)?;

        let sent = value.values();
        let error: Vec<f64> = input.iter().zip(&sent).map(|(x, s)| x - s).collect();
        residual.assign_values(&error)?;

        Ok(payload_bits)
    }
}

impl<C: Communicator> Communicator for QuantizingCommunicator<C> {
    fn current_worker(&self) -> &WorkerDescriptor {
        self.inner.current_worker()
    }

    fn workers(&self) -> &WorkerSet {
        self.inner.workers()
    }

    fn aggregate_in_place(&self, values: &mut [&mut Tensor], workers: &WorkerSet) -> Result<()> {
        self.inner.aggregate_in_place(values, workers)
    }

    fn barrier(&self) -> Result<()> {
        self.inner.barrier()
    }
}

impl<C: Communicator> QuantizedCommunicator for QuantizingCommunicator<C> {
    fn quantized_aggregate_in_place(
        &self,
        values: &mut [&mut Tensor],
        residuals: &mut [Tensor],
        workers: &WorkerSet,
    ) -> Result<()> {
        if values.len() != residuals.len() {
            return Err(MlErr::SizeMismatch {
                what: "quantization residuals",
                got: residuals.len(),
                expected: values.len(),
            }
            .into());
        }

        let payload_bits: u64 = values
            .par_iter_mut()
            .zip(residuals.par_iter_mut())
            .map(|(value, residual)| self.encode(value, residual))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .sum();

        debug!(
            worker = self.current_worker().global_rank,
            bits = self.spec.bits,
            payload_bits = payload_bits;
            "quantized gradients"
        );

        self.inner.aggregate_in_place(values, workers)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use ml_core::Device;

    use super::*;
    use crate::LocalGroup;

    fn tensor(values: &[f32]) -> Tensor {
        Tensor::from_f32_vec(&[values.len()], values.to_vec(), Device::Cpu).unwrap()
    }

    fn group(size: usize, spec: QuantizationSpec) -> Vec<QuantizingCommunicator<crate::LocalCommunicator>> {
        LocalGroup::create(size)
            .unwrap()
            .into_iter()
            .map(|comm| QuantizingCommunicator::new(comm, spec).unwrap())
            .collect()
    }

    #[test]
    fn residual_keeps_quantization_error() {
        let comm = group(1, QuantizationSpec::default()).remove(0);
        let workers = comm.workers().clone();

        let mut value = tensor(&[1., 3., -2., -4.]);
        let mut residuals = [tensor(&[0.; 4])];
        comm.quantized_aggregate_in_place(&mut [&mut value], &mut residuals, &workers)
            .unwrap();

        assert_eq!(value.values(), vec![2., 2., -3., -3.]);
        assert_eq!(residuals[0].values(), vec![-1., 1., 1., -1.]);
    }

    #[test]
    fn residual_is_fed_into_next_round() {
        let comm = group(1, QuantizationSpec::default()).remove(0);
        let workers = comm.workers().clone();

        let mut residuals = [tensor(&[0.; 2])];
        let mut total = vec![0.; 2];

        for _ in 0..4 {
            let mut value = tensor(&[1., 0.5]);
            comm.quantized_aggregate_in_place(&mut [&mut value], &mut residuals, &workers)
                .unwrap();
            total.iter_mut().zip(value.values()).for_each(|(t, v)| *t += v);
        }

        let pending = residuals[0].values();
        assert_eq!(total[0] + pending[0], 4.);
        assert_eq!(total[1] + pending[1], 2.);
    }

    #[test]
    fn exact_bits_sum_like_plain_aggregation() {
        let spec = QuantizationSpec {
            bits: 32,
            ..Default::default()
        };
        let communicators = group(2, spec);

        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = communicators
                .into_iter()
                .map(|comm| {
                    s.spawn(move || {
                        let workers = comm.workers().clone();
                        let rank = comm.current_worker().global_rank as f32;
                        let mut value = tensor(&[0.1 + rank, -rank]);
                        let mut residuals = [tensor(&[0.; 2])];
                        comm.quantized_aggregate_in_place(&mut [&mut value], &mut residuals, &workers)
                            .unwrap();
                        (value.values(), residuals[0].values())
                    })
                })
                .collect();

            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let expected = {
            let mut sum = tensor(&[0.1, 0.]);
            sum.add_assign(&tensor(&[1.1, -1.])).unwrap();
            sum.values()
        };

        for (value, residual) in results {
            assert_eq!(value, expected);
            assert_eq!(residual, vec![0., 0.]);
        }
    }

    #[test]
    fn unquantized_self_stripe_is_sent_exactly() {
        let spec = QuantizationSpec {
            use_quantization_for_self_stripe: false,
            ..Default::default()
        };
        let comm = group(1, spec).remove(0);
        let workers = comm.workers().clone();

        let mut value = tensor(&[1., 3., -2., -4.]);
        let mut residuals = [tensor(&[0.; 4])];
        comm.quantized_aggregate_in_place(&mut [&mut value], &mut residuals, &workers)
            .unwrap();

        assert_eq!(value.values(), vec![1., 3., -2., -4.]);
        assert_eq!(residuals[0].values(), vec![0.; 4]);
    }

    #[test]
    fn residual_count_must_match() {
        let comm = group(1, QuantizationSpec::default()).remove(0);
        let workers = comm.workers().clone();

        let mut value = tensor(&[1.]);
        let err = comm
            .quantized_aggregate_in_place(&mut [&mut value], &mut [], &workers)
            .unwrap_err();

        assert!(matches!(err, crate::CommsErr::Ml(MlErr::SizeMismatch { .. })));
    }
}
