use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Material quantities (batch mass, request size, capacity constraints).
pub type Quantity = Fixed64;

/// Timesteps are the atomic unit of simulation time.
pub type Ticks = u64;

/// Convert an f64 to Fixed64. Use only for configuration, never in the
/// timestep loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display and sinks.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Sum a sequence of quantities, saturating instead of wrapping.
pub fn total_quantity<I>(quantities: I) -> Quantity
where
    I: IntoIterator<Item = Quantity>,
{
    quantities
        .into_iter()
        .fold(Quantity::ZERO, |acc, q| acc.saturating_add(q))
}
