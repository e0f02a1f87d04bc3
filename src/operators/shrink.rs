//! Search-space shrinkage.

use crate::distributions::ParamRange;
use crate::error::{Error, Result};
use crate::family::Family;
use crate::individual::Individual;

/// Narrows the parameter limits of every active subtype around the values
/// its instances take among `parents`.
///
/// For each parameter with at least one realised value the new limits are
/// centred on the mean of those values, with width `width * ratio^itr`, and
/// clipped to the distribution's hard limits. Subtypes with no instance
/// among the parents are left as they are.
///
/// # Errors
/// [`Error::Config`] unless `0 < ratio < 1`.
pub fn shrink(parents: &[Individual], families: &mut [Family], itr: usize, ratio: f64) -> Result<()> {
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(Error::Config(format!(
            "shrinkage must lie strictly between 0 and 1, got {ratio}"
        )));
    }
    let factor = ratio.powf(itr as f64);

    for family in families.iter_mut() {
        let key = family.key().to_string();
        let hard = family.distribution().hard_limits();
        let ids: Vec<usize> = family.active_ids().collect();

        for id in ids {
            let instances: Vec<_> = parents
                .iter()
                .flat_map(Individual::metadata)
                .filter(|inst| inst.is_subtype(&key, id))
                .collect();
            if instances.is_empty() {
                continue;
            }
            let Some(subtype) = family.subtype_mut(id) else {
                continue;
            };

            for (name, range) in subtype.param_limits.iter_mut() {
                let values: Vec<f64> = instances
                    .iter()
                    .filter_map(|inst| inst.params().get(name))
                    .flat_map(|value| value.values().iter().copied())
                    .collect();
                if values.is_empty() {
                    continue;
                }

                let mid = values.iter().sum::<f64>() / values.len() as f64;
                let half = range.width() * factor / 2.0;
                let (lo, hi) = hard
                    .get(name)
                    .map_or((range.lower, range.upper), |h| (h.lower, h.upper));
                *range = ParamRange::new((mid - half).max(lo), (mid + half).min(hi));
            }
        }
    }
    Ok(())
}
