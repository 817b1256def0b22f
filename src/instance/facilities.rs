// src/instance/facilities.rs
//
// Capacitated facility location instance generation: uniform demands,
// capacities and opening costs, transportation costs from coordinates
// sampled on the unit square, binary single-sourcing assignment.
// Capacities are scaled so total capacity is `ratio` times total demand.

use rand::Rng;

use super::InstanceError;
use crate::random::{spawn_random_engine, RandomEngine};
use crate::solver::{Model, ProblemBuilder, Sense};

/// Generation parameters for capacitated facility location instances.
#[derive(Debug, Clone)]
pub struct FacilityLocationConfig {
    pub n_customers: usize,
    pub n_facilities: usize,
    /// Total capacity over total demand, positive.
    pub ratio: f64,
}

impl Default for FacilityLocationConfig {
    fn default() -> Self {
        Self {
            n_customers: 100,
            n_facilities: 100,
            ratio: 5.0,
        }
    }
}

impl FacilityLocationConfig {
    fn validate(&self) -> Result<(), InstanceError> {
        if self.n_customers == 0 {
            return Err(InstanceError::InvalidParameter {
                name: "n_customers",
                message: "must be positive".to_string(),
            });
        }
        if self.n_facilities == 0 {
            return Err(InstanceError::InvalidParameter {
                name: "n_facilities",
                message: "must be positive".to_string(),
            });
        }
        if !(self.ratio > 0.0) {
            return Err(InstanceError::InvalidParameter {
                name: "ratio",
                message: format!("must be positive, got {}", self.ratio),
            });
        }
        Ok(())
    }
}

/// Seedable generator of capacitated facility location instances.
pub struct CapacitatedFacilityLocationGenerator {
    config: FacilityLocationConfig,
    rng: RandomEngine,
}

impl CapacitatedFacilityLocationGenerator {
    /// Create a generator. Without an explicit engine, one is spawned
    /// from the process-wide source.
    pub fn new(
        config: FacilityLocationConfig,
        rng: Option<RandomEngine>,
    ) -> Result<Self, InstanceError> {
        config.validate()?;
        Ok(Self {
            config,
            rng: rng.unwrap_or_else(spawn_random_engine),
        })
    }

    pub fn config(&self) -> &FacilityLocationConfig {
        &self.config
    }

    /// Reseed the generator, restarting its instance sequence.
    pub fn seed(&mut self, seed: u64) {
        self.rng.seed(seed);
    }

    /// Sample one instance with the given parameters.
    pub fn generate_instance(
        config: &FacilityLocationConfig,
        rng: &mut RandomEngine,
    ) -> Result<Model, InstanceError> {
        config.validate()?;
        let n_customers = config.n_customers;
        let n_facilities = config.n_facilities;

        let demands: Vec<f64> = (0..n_customers)
            .map(|_| rng.gen_range(5.0f64..35.0).round())
            .collect();
        let mut capacities: Vec<f64> = (0..n_facilities)
            .map(|_| rng.gen_range(10.0..160.0))
            .collect();
        let fixed_costs: Vec<f64> = (0..n_facilities)
            .map(|_| rng.gen_range(100.0f64..200.0).round())
            .collect();

        let customer_xy: Vec<(f64, f64)> = (0..n_customers)
            .map(|_| (rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)))
            .collect();
        let facility_xy: Vec<(f64, f64)> = (0..n_facilities)
            .map(|_| (rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)))
            .collect();

        // Scale capacities to the requested capacity/demand ratio.
        let total_demand: f64 = demands.iter().sum();
        let total_capacity: f64 = capacities.iter().sum();
        let scale = config.ratio * total_demand / total_capacity;
        for capacity in &mut capacities {
            *capacity = (*capacity * scale).round().max(1.0);
        }

        let mut builder =
            ProblemBuilder::new("capacitated_facility_location", Sense::Minimize);

        let open: Vec<usize> = (0..n_facilities)
            .map(|j| builder.add_binary(&format!("open{}", j), fixed_costs[j]))
            .collect();
        let mut serve = vec![Vec::with_capacity(n_facilities); n_customers];
        for (i, row) in serve.iter_mut().enumerate() {
            let (cx, cy) = customer_xy[i];
            for (j, &(fx, fy)) in facility_xy.iter().enumerate() {
                let distance = ((cx - fx).powi(2) + (cy - fy).powi(2)).sqrt();
                let cost = 10.0 * distance * demands[i];
                row.push(builder.add_binary(&format!("serve{}_{}", i, j), cost));
            }
        }

        // Each customer is served by exactly one facility.
        for i in 0..n_customers {
            builder.add_constraint(
                &format!("assign{}", i),
                (0..n_facilities).map(|j| (serve[i][j], 1.0)).collect(),
                Some(1.0),
                Some(1.0),
            );
        }

        // Served demand must fit the capacity of open facilities.
        for j in 0..n_facilities {
            let mut coefficients: Vec<(usize, f64)> = (0..n_customers)
                .map(|i| (serve[i][j], demands[i]))
                .collect();
            coefficients.push((open[j], -capacities[j]));
            builder.add_constraint(
                &format!("capacity{}", j),
                coefficients,
                None,
                Some(0.0),
            );
        }

        Ok(Model::from_data(builder.build())?)
    }
}

impl Iterator for CapacitatedFacilityLocationGenerator {
    type Item = Result<Model, InstanceError>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(Self::generate_instance(&self.config, &mut self.rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> FacilityLocationConfig {
        FacilityLocationConfig {
            n_customers: 3,
            n_facilities: 2,
            ratio: 2.0,
        }
    }

    #[test]
    fn rejects_out_of_domain_parameters() {
        let mut config = tiny_config();
        config.ratio = 0.0;
        assert!(CapacitatedFacilityLocationGenerator::new(config, None).is_err());

        let mut config = tiny_config();
        config.n_customers = 0;
        assert!(CapacitatedFacilityLocationGenerator::new(config, None).is_err());
    }

    #[test]
    fn instances_have_the_expected_shape() {
        let mut rng = RandomEngine::new(21);
        let model = CapacitatedFacilityLocationGenerator::generate_instance(
            &tiny_config(),
            &mut rng,
        )
        .unwrap();

        // open variables + one serve variable per (customer, facility).
        assert_eq!(model.num_vars().unwrap(), 2 + 3 * 2);
        // assignment rows + capacity rows.
        assert_eq!(model.rows().unwrap().len(), 3 + 2);
    }

    #[test]
    fn generation_is_deterministic_given_the_seed() {
        let mut generator =
            CapacitatedFacilityLocationGenerator::new(tiny_config(), None).unwrap();
        generator.seed(4);
        let a = generator.next().unwrap().unwrap();
        generator.seed(4);
        let b = generator.next().unwrap().unwrap();

        assert_eq!(a.variables().unwrap(), b.variables().unwrap());
        assert_eq!(a.rows().unwrap(), b.rows().unwrap());
    }
}
