use crate::error::{ModelError, Result};
use crate::math::TOLERANCE;
use crate::model::{ModelStore, NodeId};

impl ModelStore {
    /// Computes a weighted average of a scalar parameter over the
    /// direct children of a node.
    ///
    /// Children missing the parameter (or the weight parameter, when
    /// one is named) do not participate. With no weight parameter every
    /// participant weighs the same. `absolute` averages magnitudes;
    /// otherwise negative values are allowed and simply pull the sum
    /// down.
    ///
    /// # Errors
    ///
    /// Returns an error when no child participates, a weight is
    /// negative, or the weights sum to zero.
    pub fn avg_param(
        &self,
        id: NodeId,
        param: &str,
        weight_param: Option<&str>,
        absolute: bool,
    ) -> Result<f64> {
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        let mut participants = 0_usize;
        for &child in self.children(id) {
            let Some(value) = self.param_f64(child, param) else {
                continue;
            };
            let weight = match weight_param {
                Some(wp) => match self.param_f64(child, wp) {
                    Some(w) => w,
                    None => continue,
                },
                None => 1.0,
            };
            if weight < 0.0 {
                return Err(ModelError::NegativeWeight {
                    node: self.name(id).to_string(),
                    param: weight_param.unwrap_or(param).to_string(),
                    weight,
                }
                .into());
            }
            let value = if absolute { value.abs() } else { value };
            weighted_sum += value * weight;
            weight_sum += weight;
            participants += 1;
        }
        if participants == 0 {
            return Err(ModelError::NoParticipatingChildren {
                node: self.name(id).to_string(),
                param: param.to_string(),
            }
            .into());
        }
        if weight_sum.abs() < TOLERANCE {
            return Err(ModelError::ZeroWeightSum {
                node: self.name(id).to_string(),
                param: weight_param.unwrap_or(param).to_string(),
            }
            .into());
        }
        Ok(weighted_sum / weight_sum)
    }

    /// Returns the child holding the largest value of a parameter.
    ///
    /// Children missing the parameter are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error when no child carries the parameter.
    pub fn max_param(&self, id: NodeId, param: &str) -> Result<(NodeId, f64)> {
        self.extreme_param(id, param, f64::gt)
    }

    /// Returns the child holding the smallest value of a parameter.
    ///
    /// Children missing the parameter are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error when no child carries the parameter.
    pub fn min_param(&self, id: NodeId, param: &str) -> Result<(NodeId, f64)> {
        self.extreme_param(id, param, f64::lt)
    }

    fn extreme_param(
        &self,
        id: NodeId,
        param: &str,
        wins: fn(&f64, &f64) -> bool,
    ) -> Result<(NodeId, f64)> {
        let mut best: Option<(NodeId, f64)> = None;
        for &child in self.children(id) {
            let Some(value) = self.param_f64(child, param) else {
                continue;
            };
            match best {
                Some((_, current)) if !wins(&value, &current) => {}
                _ => best = Some((child, value)),
            }
        }
        best.ok_or_else(|| {
            ModelError::NoParticipatingChildren {
                node: self.name(id).to_string(),
                param: param.to_string(),
            }
            .into()
        })
    }
}
