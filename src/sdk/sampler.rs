//! Head sampling.
//!
//! The sampler decides, at span start, whether a span will be exported. Only
//! the decision families the configuration layer names are implemented here;
//! anything adaptive belongs to the backend.
use std::fmt;
use std::sync::Mutex;
use std::time::Instant;

/// Sampler configuration, as resolved by the tracer factory.
///
/// The parameter types mirror the configuration contract: `const` takes an
/// integer, the remaining families take floats.
#[derive(Clone, Debug, PartialEq)]
pub enum Sampler {
    /// Sample everything when the parameter is non-zero, nothing when zero.
    Const(i64),
    /// Sample each trace with the given probability in `[0.0, 1.0]`.
    Probabilistic(f64),
    /// Sample at most the given number of traces per second.
    RateLimiting(f64),
    /// Guarantee at least the given number of traces per second are offered
    /// for sampling; implemented as a rate-limited floor.
    LowerBound(f64),
}

impl Default for Sampler {
    fn default() -> Self {
        Sampler::Const(1)
    }
}

impl Sampler {
    /// Parse a `(type, param)` pair from layered configuration.
    ///
    /// The parameter is parsed as an integer for `const` and a float for the
    /// other families.
    pub fn from_type_and_param(sampler_type: &str, param: &str) -> Result<Sampler, String> {
        match sampler_type.trim().to_lowercase().as_str() {
            "const" => param
                .trim()
                .parse::<i64>()
                .map(Sampler::Const)
                .map_err(|_| format!("const sampler takes an integer param, got '{}'", param)),
            "probabilistic" => param
                .trim()
                .parse::<f64>()
                .map(Sampler::Probabilistic)
                .map_err(|_| format!("probabilistic sampler takes a float param, got '{}'", param)),
            "ratelimiting" => param
                .trim()
                .parse::<f64>()
                .map(Sampler::RateLimiting)
                .map_err(|_| format!("ratelimiting sampler takes a float param, got '{}'", param)),
            "lowerbound" => param
                .trim()
                .parse::<f64>()
                .map(Sampler::LowerBound)
                .map_err(|_| format!("lowerbound sampler takes a float param, got '{}'", param)),
            other => Err(format!("unrecognized sampler type '{}'", other)),
        }
    }

    /// Build the runtime decision-maker for this configuration.
    pub fn build(&self) -> Box<dyn ShouldSample> {
        match *self {
            Sampler::Const(param) => Box::new(ConstSampler { decision: param != 0 }),
            Sampler::Probabilistic(rate) => Box::new(ProbabilisticSampler { rate }),
            Sampler::RateLimiting(per_second) | Sampler::LowerBound(per_second) => {
                Box::new(RateLimitingSampler::new(per_second))
            }
        }
    }
}

/// Returns the sampling decision for a span about to be created.
pub trait ShouldSample: Send + Sync + fmt::Debug {
    /// Whether a span with the given operation name should be sampled.
    fn should_sample(&self, name: &str) -> bool;
}

#[derive(Debug)]
struct ConstSampler {
    decision: bool,
}

impl ShouldSample for ConstSampler {
    fn should_sample(&self, _name: &str) -> bool {
        self.decision
    }
}

#[derive(Debug)]
struct ProbabilisticSampler {
    rate: f64,
}

impl ShouldSample for ProbabilisticSampler {
    fn should_sample(&self, _name: &str) -> bool {
        rand::random::<f64>() < self.rate
    }
}

/// Token bucket refilled at `per_second`, burst capacity of one second.
#[derive(Debug)]
struct RateLimitingSampler {
    per_second: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    balance: f64,
    last_tick: Instant,
}

impl RateLimitingSampler {
    fn new(per_second: f64) -> Self {
        RateLimitingSampler {
            per_second,
            state: Mutex::new(BucketState {
                balance: per_second.max(1.0),
                last_tick: Instant::now(),
            }),
        }
    }
}

impl ShouldSample for RateLimitingSampler {
    fn should_sample(&self, _name: &str) -> bool {
        if self.per_second <= 0.0 {
            return false;
        }
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_tick).as_secs_f64();
        state.last_tick = now;
        state.balance = (state.balance + elapsed * self.per_second).min(self.per_second.max(1.0));
        if state.balance >= 1.0 {
            state.balance -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_type_and_param() {
        assert_eq!(
            Sampler::from_type_and_param("const", "1").unwrap(),
            Sampler::Const(1)
        );
        assert_eq!(
            Sampler::from_type_and_param("probabilistic", "0.25").unwrap(),
            Sampler::Probabilistic(0.25)
        );
        assert_eq!(
            Sampler::from_type_and_param("ratelimiting", "100").unwrap(),
            Sampler::RateLimiting(100.0)
        );
        assert_eq!(
            Sampler::from_type_and_param("lowerbound", "0.5").unwrap(),
            Sampler::LowerBound(0.5)
        );

        // const takes an integer, not a float
        assert!(Sampler::from_type_and_param("const", "0.5").is_err());
        assert!(Sampler::from_type_and_param("adaptive", "1").is_err());
        assert!(Sampler::from_type_and_param("probabilistic", "most").is_err());
    }

    #[test]
    fn const_decisions() {
        assert!(Sampler::Const(1).build().should_sample("op"));
        assert!(Sampler::Const(-3).build().should_sample("op"));
        assert!(!Sampler::Const(0).build().should_sample("op"));
    }

    #[test]
    fn probabilistic_bounds() {
        let always = Sampler::Probabilistic(1.1).build();
        let never = Sampler::Probabilistic(0.0).build();
        for _ in 0..64 {
            assert!(always.should_sample("op"));
            assert!(!never.should_sample("op"));
        }
    }

    #[test]
    fn rate_limiting_exhausts_burst() {
        let sampler = Sampler::RateLimiting(2.0).build();
        let granted = (0..16).filter(|_| sampler.should_sample("op")).count();
        assert!(granted >= 1 && granted <= 3, "granted {}", granted);
    }

    #[test]
    fn rate_limiting_zero_never_samples() {
        let sampler = Sampler::RateLimiting(0.0).build();
        assert!(!sampler.should_sample("op"));
    }
}
