//! Lossy value codecs used to shrink gradient exchanges.
//!
//! A codec turns a slice of values into a compact representation and back. The
//! reconstruction error is returned to the caller, which feeds it into the next
//! round so no gradient information is lost over time.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::{CommsErr, Result};

/// Bits of the scalars that travel next to the codes of a quantized slice.
const HEADER_VALUE_BITS: u64 = 64;

/// From this amount of bits per value, values are exchanged unquantized.
pub const EXACT_BITS: u32 = 32;

fn default_bits() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

/// The specification for the quantizing communicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantizationSpec {
    #[serde(default = "default_bits")]
    pub bits: u32,
    #[serde(default = "default_true")]
    pub zero_threshold_for_1bit: bool,
    #[serde(default = "default_true")]
    pub use_quantization_for_self_stripe: bool,
}

impl Default for QuantizationSpec {
    fn default() -> Self {
        Self {
            bits: default_bits(),
            zero_threshold_for_1bit: true,
            use_quantization_for_self_stripe: true,
        }
    }
}

impl QuantizationSpec {
    /// Checks the amount of bits is usable.
    ///
    /// # Returns
    /// `InvalidQuantization` if `bits` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.bits == 0 {
            return Err(CommsErr::InvalidQuantization { bits: self.bits });
        }

        Ok(())
    }

    /// Whether this spec transmits values without loss.
    pub fn is_exact(&self) -> bool {
        self.bits >= EXACT_BITS
    }
}

/// A quantized slice of values.
#[derive(Debug, Clone, PartialEq)]
pub enum QuantizedValues {
    /// Values sent as they are.
    Exact { values: Vec<f64>, element_bits: u32 },
    /// One bit per value choosing between the mean below and above the threshold.
    Sign {
        below: f64,
        above: f64,
        codes: Vec<bool>,
    },
    /// `bits` bits per value indexing uniformly spaced levels starting at `lower`.
    Levels {
        lower: f64,
        step: f64,
        bits: u32,
        codes: Vec<u32>,
    },
}

impl QuantizedValues {
    /// Reconstructs the values.
    pub fn dequantize(&self) -> Vec<f64> {
        match self {
            QuantizedValues::Exact { values, .. } => values.clone(),
            QuantizedValues::Sign { below, above, codes } => codes
                .iter()
                .map(|&is_above| if is_above { *above } else { *below })
                .collect(),
            QuantizedValues::Levels {
                lower, step, codes, ..
            } => codes
                .iter()
                .map(|&code| lower + f64::from(code) * step)
                .collect(),
        }
    }

    /// The size in bits this slice takes on the wire.
    pub fn payload_bits(&self) -> u64 {
        match self {
            QuantizedValues::Exact {
                values,
                element_bits,
            } => values.len() as u64 * u64::from(*element_bits),
            QuantizedValues::Sign { codes, .. } => 2 * HEADER_VALUE_BITS + codes.len() as u64,
            QuantizedValues::Levels { bits, codes, .. } => {
                2 * HEADER_VALUE_BITS + codes.len() as u64 * u64::from(*bits)
            }
        }
    }
}

/// Quantizes slices of values according to a `QuantizationSpec`.
#[derive(Debug, Clone, Copy)]
pub struct Quantizer {
    bits: u32,
    zero_threshold: bool,
}

impl Quantizer {
    /// Creates a new `Quantizer`.
    ///
    /// # Arguments
    /// * `spec` - The quantization specification.
    ///
    /// # Returns
    /// A new `Quantizer` or an error if the spec is invalid.
    pub fn new(spec: &QuantizationSpec) -> Result<Self> {
        spec.validate()?;

        Ok(Self {
            bits: spec.bits,
            zero_threshold: spec.zero_threshold_for_1bit,
        })
    }

    /// Quantizes `values`.
    ///
    /// # Arguments
    /// * `values` - The values to encode.
    /// * `element_bits` - The width of an unquantized value, used for exact payloads.
    ///
    /// # Returns
    /// The encoded values.
    pub fn quantize(&self, values: &[f64], element_bits: u32) -> QuantizedValues {
        if self.bits >= EXACT_BITS || values.is_empty() {
            return QuantizedValues::Exact {
                values: values.to_vec(),
                element_bits,
            };
        }

        if self.bits == 1 {
            self.quantize_sign(values)
        } else {
            self.quantize_levels(values)
        }
    }

    fn quantize_sign(&self, values: &[f64]) -> QuantizedValues {
        let threshold = if self.zero_threshold {
            0.
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        };

        let codes: Vec<bool> = values.iter().map(|&v| v >= threshold).collect();

        let (mut sum_below, mut n_below, mut sum_above, mut n_above) = (0., 0usize, 0., 0usize);
        for (&v, &is_above) in values.iter().zip(&codes) {
            if is_above {
                sum_above += v;
                n_above += 1;
            } else {
                sum_below += v;
                n_below += 1;
            }
        }

        let mean_or = |sum: f64, n: usize| if n == 0 { threshold } else { sum / n as f64 };

        QuantizedValues::Sign {
            below: mean_or(sum_below, n_below),
            above: mean_or(sum_above, n_above),
            codes,
        }
    }

    fn quantize_levels(&self, values: &[f64]) -> QuantizedValues {
        let lower = values.iter().copied().fold(f64::INFINITY, f64::min);
        let upper = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let max_code = (1u64 << self.bits) - 1;
        let step = (upper - lower) / max_code as f64;

        let codes = values
            .iter()
            .map(|&v| {
                if step > 0. {
                    ((v - lower) / step).round().clamp(0., max_code as f64) as u32
                } else {
                    0
                }
            })
            .collect();

        QuantizedValues::Levels {
            lower,
            step,
            bits: self.bits,
            codes,
        }
    }
}

/// The contiguous range of a flattened tensor of `len` values owned by `rank`.
///
/// Every worker owns `len / workers` values, the first `len % workers` workers own
/// one more.
pub fn stripe(len: usize, workers: usize, rank: usize) -> Range<usize> {
    let workers = workers.max(1);
    let base = len / workers;
    let extra = len % workers;

    let start = rank * base + rank.min(extra);
    let end = start + base + usize::from(rank < extra);
    start.min(len)..end.min(len)
}
