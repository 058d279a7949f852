//! Simulation scenarios.

use serde::{Deserialize, Serialize};

/// A simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Conversions need live provider rates.
    #[serde(default)]
    pub market_rates: bool,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// A step in a scenario.
///
/// Amounts and prices are decimal strings so scenarios can be written as
/// JSON without float rounding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Open an empty account.
    OpenAccount { account: String },
    /// Fee-bearing deposit.
    Deposit {
        account: String,
        asset: String,
        amount: String,
    },
    /// Fee-bearing withdrawal.
    Withdraw {
        account: String,
        asset: String,
        amount: String,
    },
    /// Cross-asset conversion.
    Convert {
        account: String,
        from: String,
        to: String,
        amount: String,
    },
    /// Move the ledger clock forward.
    Advance { seconds: u64 },
    /// Inject a provider fault.
    InjectFault { fault: Fault },
    /// Change the quoted price of an asset.
    SetPrice { asset: String, price: String },
    /// Many callers fetching the same price at once.
    ConcurrentFetch { asset: String, callers: usize },
    /// Value an account in USD and log the result.
    Value { account: String },
    /// Save an account snapshot to the store.
    Save { account: String },
    /// Random operations across all open accounts.
    RandomOps { count: usize },
    /// Assert a condition.
    Assert { condition: AssertCondition },
}

/// Faults that can be injected into the quote provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fault {
    /// The next `count` provider calls fail with a transport error.
    FailNext { count: u32 },
    /// The provider stops quoting an asset.
    Delist { asset: String },
}

/// Conditions that can be asserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssertCondition {
    /// Wallet balance equals an exact amount.
    BalanceEquals {
        account: String,
        asset: String,
        amount: String,
    },
    /// The fee pool holds exactly this much of an asset.
    FeesCollected { asset: String, amount: String },
    /// The provider has been called exactly this many times.
    ProviderCalls { count: u32 },
    /// The last operation failed with this error code.
    LastErrorCode { code: String },
}

impl Scenario {
    /// Names of the built-in scenarios.
    pub const BUILT_IN: [&'static str; 5] = [
        "basic",
        "flaky-provider",
        "coalescing",
        "stale-prices",
        "random",
    ];

    /// Load a scenario by name, or from a JSON file when the name ends in
    /// `.json`.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        if name.ends_with(".json") {
            let raw = std::fs::read_to_string(name)?;
            return Ok(serde_json::from_str(&raw)?);
        }

        match name {
            "basic" => Ok(Self::basic()),
            "flaky-provider" => Ok(Self::flaky_provider()),
            "coalescing" => Ok(Self::coalescing()),
            "stale-prices" => Ok(Self::stale_prices()),
            "random" => Ok(Self::random()),
            _ => Err(anyhow::anyhow!("Unknown scenario: {}", name)),
        }
    }

    /// Deposit, convert and withdraw on a single account.
    fn basic() -> Self {
        Self {
            name: "basic".to_string(),
            description: "Deposit BTC, convert half to ETH, withdraw ETH".to_string(),
            market_rates: false,
            steps: vec![
                ScenarioStep::OpenAccount {
                    account: "alice".to_string(),
                },
                ScenarioStep::Deposit {
                    account: "alice".to_string(),
                    asset: "BTC".to_string(),
                    amount: "1".to_string(),
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::BalanceEquals {
                        account: "alice".to_string(),
                        asset: "BTC".to_string(),
                        amount: "0.998".to_string(),
                    },
                },
                ScenarioStep::Convert {
                    account: "alice".to_string(),
                    from: "BTC".to_string(),
                    to: "ETH".to_string(),
                    amount: "0.5".to_string(),
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::BalanceEquals {
                        account: "alice".to_string(),
                        asset: "ETH".to_string(),
                        amount: "9.95".to_string(),
                    },
                },
                ScenarioStep::Withdraw {
                    account: "alice".to_string(),
                    asset: "ETH".to_string(),
                    amount: "20".to_string(),
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::LastErrorCode {
                        code: "INSUFFICIENT_FUNDS".to_string(),
                    },
                },
                ScenarioStep::Withdraw {
                    account: "alice".to_string(),
                    asset: "ETH".to_string(),
                    amount: "5".to_string(),
                },
                ScenarioStep::Value {
                    account: "alice".to_string(),
                },
                ScenarioStep::Save {
                    account: "alice".to_string(),
                },
            ],
        }
    }

    /// Provider failures absorbed by retries, then exhaustion.
    fn flaky_provider() -> Self {
        Self {
            name: "flaky-provider".to_string(),
            description: "Transient provider failures are retried with backoff".to_string(),
            market_rates: true,
            steps: vec![
                ScenarioStep::OpenAccount {
                    account: "bob".to_string(),
                },
                ScenarioStep::Deposit {
                    account: "bob".to_string(),
                    asset: "USDT".to_string(),
                    amount: "10000".to_string(),
                },
                ScenarioStep::InjectFault {
                    fault: Fault::FailNext { count: 2 },
                },
                ScenarioStep::Convert {
                    account: "bob".to_string(),
                    from: "USDT".to_string(),
                    to: "BTC".to_string(),
                    amount: "4500".to_string(),
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::ProviderCalls { count: 4 },
                },
                ScenarioStep::Advance { seconds: 600 },
                ScenarioStep::InjectFault {
                    fault: Fault::FailNext { count: 3 },
                },
                ScenarioStep::Convert {
                    account: "bob".to_string(),
                    from: "USDT".to_string(),
                    to: "ETH".to_string(),
                    amount: "1000".to_string(),
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::LastErrorCode {
                        code: "RATE_UNAVAILABLE".to_string(),
                    },
                },
            ],
        }
    }

    /// Concurrent fetches for one asset share a single provider call.
    fn coalescing() -> Self {
        Self {
            name: "coalescing".to_string(),
            description: "Concurrent price requests collapse into one provider call".to_string(),
            market_rates: false,
            steps: vec![
                ScenarioStep::ConcurrentFetch {
                    asset: "ETH".to_string(),
                    callers: 50,
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::ProviderCalls { count: 1 },
                },
                ScenarioStep::ConcurrentFetch {
                    asset: "ETH".to_string(),
                    callers: 50,
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::ProviderCalls { count: 1 },
                },
            ],
        }
    }

    /// Valuation keeps working from cached prices while the provider is down.
    fn stale_prices() -> Self {
        Self {
            name: "stale-prices".to_string(),
            description: "Valuation falls back to expired prices".to_string(),
            market_rates: false,
            steps: vec![
                ScenarioStep::OpenAccount {
                    account: "carol".to_string(),
                },
                ScenarioStep::Deposit {
                    account: "carol".to_string(),
                    asset: "ETH".to_string(),
                    amount: "3".to_string(),
                },
                ScenarioStep::Value {
                    account: "carol".to_string(),
                },
                ScenarioStep::Advance { seconds: 301 },
                ScenarioStep::InjectFault {
                    fault: Fault::Delist {
                        asset: "ETH".to_string(),
                    },
                },
                ScenarioStep::Value {
                    account: "carol".to_string(),
                },
                ScenarioStep::SetPrice {
                    asset: "ETH".to_string(),
                    price: "2400".to_string(),
                },
                ScenarioStep::Value {
                    account: "carol".to_string(),
                },
            ],
        }
    }

    /// Seeded random workload across several accounts.
    fn random() -> Self {
        let accounts = ["dave", "erin", "frank"];
        let mut steps: Vec<ScenarioStep> = accounts
            .iter()
            .flat_map(|a| {
                [
                    ScenarioStep::OpenAccount {
                        account: a.to_string(),
                    },
                    ScenarioStep::Deposit {
                        account: a.to_string(),
                        asset: "USDT".to_string(),
                        amount: "50000".to_string(),
                    },
                ]
            })
            .collect();
        steps.push(ScenarioStep::RandomOps { count: 500 });
        steps.extend(accounts.iter().map(|a| ScenarioStep::Save {
            account: a.to_string(),
        }));

        Self {
            name: "random".to_string(),
            description: "Random deposits, withdrawals and conversions".to_string(),
            market_rates: false,
            steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_in_scenarios_load() {
        for name in Scenario::BUILT_IN {
            let scenario = Scenario::load(name).unwrap();
            assert_eq!(scenario.name, name);
            assert!(!scenario.steps.is_empty());
        }
        assert!(Scenario::load("nope").is_err());
    }

    #[test]
    fn test_scenario_json_shape() {
        let raw = r#"{
            "name": "custom",
            "description": "from json",
            "steps": [
                {"step": "open_account", "account": "zoe"},
                {"step": "inject_fault", "fault": {"kind": "fail_next", "count": 1}},
                {"step": "assert", "condition": {"kind": "provider_calls", "count": 0}}
            ]
        }"#;

        let scenario: Scenario = serde_json::from_str(raw).unwrap();
        assert_eq!(scenario.steps.len(), 3);
        assert!(matches!(
            scenario.steps[1],
            ScenarioStep::InjectFault {
                fault: Fault::FailNext { count: 1 }
            }
        ));
    }
}
