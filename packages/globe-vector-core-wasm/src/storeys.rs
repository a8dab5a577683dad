// Distribution of an extrusion height into storeys

pub const MAX_STOREYS: usize = 100;

/// Splits `abs(extruded_height)` into storey heights.
///
/// Explicit heights are consumed in order and then extended with the last one; without
/// explicit heights `default_height` is repeated. The final entry absorbs the remainder,
/// so the sum always equals the target. At most [`MAX_STOREYS`] entries are produced.
pub fn get_storey_heights(
    extruded_height: f64,
    explicit_heights: &[f64],
    default_height: f64,
) -> Vec<f64> {
    let target = extruded_height.abs();
    if target == 0.0 || !target.is_finite() {
        return Vec::new();
    }

    let explicit: Vec<f64> = explicit_heights
        .iter()
        .copied()
        .filter(|h| h.is_finite() && *h > 0.0)
        .collect();
    let repeat = explicit.last().copied().unwrap_or(default_height);

    let mut heights = Vec::new();
    let mut sum = 0.0;
    let mut explicit = explicit.into_iter();
    loop {
        let next = explicit.next().unwrap_or(repeat);
        if !next.is_finite() || next <= 0.0 || sum + next >= target || heights.len() + 1 == MAX_STOREYS
        {
            heights.push(target - sum);
            return heights;
        }
        heights.push(next);
        sum += next;
    }
}

/// Brings `storey_heights` in line with `storey_count`: capped at [`MAX_STOREYS`], emptied
/// for a zero count, padded with its last entry or truncated otherwise.
pub fn validate_storeys(storey_count: usize, storey_heights: &mut Vec<f64>) {
    let storey_count = storey_count.min(MAX_STOREYS);
    let Some(last) = storey_heights.last().copied() else {
        return;
    };
    if storey_count == 0 {
        storey_heights.clear();
    } else if storey_heights.len() < storey_count {
        storey_heights.resize(storey_count, last);
    } else {
        storey_heights.truncate(storey_count);
    }
}
