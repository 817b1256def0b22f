// src/instance/setcover.rs
//
// Set cover instance generation: random coverage matrix with a target
// density, every column nonempty and every row covered, uniform integer
// objective costs. Minimization over binary column-selection variables.

use rand::Rng;

use super::InstanceError;
use crate::random::{spawn_random_engine, RandomEngine};
use crate::solver::{Model, ProblemBuilder, Sense};

/// Generation parameters for set cover instances.
#[derive(Debug, Clone)]
pub struct SetCoverConfig {
    /// Number of rows (elements to cover).
    pub n_rows: usize,
    /// Number of columns (sets, one binary variable each).
    pub n_cols: usize,
    /// Density of the coverage matrix, in (0, 1].
    pub density: f64,
    /// Maximum objective coefficient, at least 1.
    pub max_coef: u64,
}

impl Default for SetCoverConfig {
    fn default() -> Self {
        Self {
            n_rows: 500,
            n_cols: 1000,
            density: 0.05,
            max_coef: 100,
        }
    }
}

impl SetCoverConfig {
    fn validate(&self) -> Result<(), InstanceError> {
        if self.n_rows == 0 {
            return Err(InstanceError::InvalidParameter {
                name: "n_rows",
                message: "must be positive".to_string(),
            });
        }
        if self.n_cols == 0 {
            return Err(InstanceError::InvalidParameter {
                name: "n_cols",
                message: "must be positive".to_string(),
            });
        }
        if !(self.density > 0.0 && self.density <= 1.0) {
            return Err(InstanceError::InvalidParameter {
                name: "density",
                message: format!("must be in (0, 1], got {}", self.density),
            });
        }
        if self.max_coef < 1 {
            return Err(InstanceError::InvalidParameter {
                name: "max_coef",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Seedable generator of set cover instances.
pub struct SetCoverGenerator {
    config: SetCoverConfig,
    rng: RandomEngine,
}

impl SetCoverGenerator {
    /// Create a generator. Without an explicit engine, one is spawned
    /// from the process-wide source.
    pub fn new(
        config: SetCoverConfig,
        rng: Option<RandomEngine>,
    ) -> Result<Self, InstanceError> {
        config.validate()?;
        Ok(Self {
            config,
            rng: rng.unwrap_or_else(spawn_random_engine),
        })
    }

    pub fn config(&self) -> &SetCoverConfig {
        &self.config
    }

    /// Reseed the generator, restarting its instance sequence.
    pub fn seed(&mut self, seed: u64) {
        self.rng.seed(seed);
    }

    /// Sample one instance with the given parameters.
    pub fn generate_instance(
        config: &SetCoverConfig,
        rng: &mut RandomEngine,
    ) -> Result<Model, InstanceError> {
        config.validate()?;
        let n_rows = config.n_rows;
        let n_cols = config.n_cols;

        // Rows covered per column, at least one.
        let per_col = ((config.density * n_rows as f64).round() as usize)
            .clamp(1, n_rows);

        let mut covers: Vec<Vec<usize>> = Vec::with_capacity(n_cols);
        let mut covered = vec![false; n_rows];
        for _ in 0..n_cols {
            // Partial Fisher-Yates draw of `per_col` distinct rows.
            let mut pool: Vec<usize> = (0..n_rows).collect();
            let mut rows = Vec::with_capacity(per_col);
            for k in 0..per_col {
                let j = rng.gen_range(k..n_rows);
                pool.swap(k, j);
                rows.push(pool[k]);
                covered[pool[k]] = true;
            }
            covers.push(rows);
        }

        // Patch uncovered rows into a random column each.
        for (row, is_covered) in covered.iter().enumerate() {
            if !is_covered {
                let col = rng.gen_range(0..n_cols);
                covers[col].push(row);
            }
        }

        let mut builder = ProblemBuilder::new("set_cover", Sense::Minimize);
        for col in 0..n_cols {
            let cost = rng.gen_range(1..=config.max_coef) as f64;
            builder.add_binary(&format!("x{}", col), cost);
        }

        let mut row_members: Vec<Vec<usize>> = vec![Vec::new(); n_rows];
        for (col, rows) in covers.iter().enumerate() {
            for &row in rows {
                row_members[row].push(col);
            }
        }
        for (row, members) in row_members.iter().enumerate() {
            builder.add_constraint(
                &format!("cover{}", row),
                members.iter().map(|&col| (col, 1.0)).collect(),
                Some(1.0),
                None,
            );
        }

        Ok(Model::from_data(builder.build())?)
    }
}

impl Iterator for SetCoverGenerator {
    type Item = Result<Model, InstanceError>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(Self::generate_instance(&self.config, &mut self.rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SetCoverConfig {
        SetCoverConfig {
            n_rows: 6,
            n_cols: 10,
            density: 0.3,
            max_coef: 10,
        }
    }

    #[test]
    fn rejects_out_of_domain_parameters() {
        let mut config = small_config();
        config.density = 0.0;
        assert!(SetCoverGenerator::new(config, None).is_err());

        let mut config = small_config();
        config.density = 1.5;
        assert!(SetCoverGenerator::new(config, None).is_err());

        let mut config = small_config();
        config.max_coef = 0;
        assert!(SetCoverGenerator::new(config, None).is_err());
    }

    #[test]
    fn instances_have_the_requested_shape() {
        let mut rng = RandomEngine::new(5);
        let model =
            SetCoverGenerator::generate_instance(&small_config(), &mut rng).unwrap();
        assert_eq!(model.num_vars().unwrap(), 10);
        assert_eq!(model.rows().unwrap().len(), 6);
        // Every row must be coverable.
        for row in model.rows().unwrap() {
            assert!(!row.coefficients.is_empty());
        }
    }

    #[test]
    fn generated_instances_are_feasible() {
        let mut rng = RandomEngine::new(7);
        let mut model =
            SetCoverGenerator::generate_instance(&small_config(), &mut rng).unwrap();
        model.solve().unwrap();
        assert!(model.is_solved().unwrap());
        // Selecting every set is feasible, so an optimum exists below the
        // total cost.
        assert!(model.primal_bound().unwrap() <= 10.0 * 10.0);
    }

    #[test]
    fn reseeding_restarts_the_sequence() {
        let mut generator = SetCoverGenerator::new(small_config(), None).unwrap();

        generator.seed(99);
        let a = generator.next().unwrap().unwrap();
        let b = generator.next().unwrap().unwrap();

        generator.seed(99);
        let a2 = generator.next().unwrap().unwrap();
        let b2 = generator.next().unwrap().unwrap();

        // Compare problem definitions through their views.
        assert_eq!(a.rows().unwrap(), a2.rows().unwrap());
        assert_eq!(b.rows().unwrap(), b2.rows().unwrap());
        assert_eq!(a.variables().unwrap(), a2.variables().unwrap());
    }
}
