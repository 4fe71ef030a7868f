//! Relay configuration
//!
//! Defines every tunable of the relay: storage, ledger and compute endpoints,
//! the on-chain object ids the relay interacts with, and polling behaviour.

use std::time::Duration;

/// On-chain identifiers of the CloakX registry deployment
#[derive(Debug, Clone)]
pub struct ContractConfig {
    /// Package the registry modules were published under
    pub package_id: String,
    /// Module whose events are tracked and whose `complete_job` is invoked
    pub module: String,
    pub job_registry_id: String,
    pub pool_registry_id: String,
    /// Capability authorising `complete_job`
    pub admin_cap_id: String,
    /// Registered enclave identity the result signature is checked against
    pub enclave_object_id: String,
    pub jobs_table_id: String,
    pub pool_users_table_id: String,
    pub pool_data_table_id: String,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            package_id: "0x4ed393ca28d4e62d864c49375d2981ab0d0d89f4b9ecc139c804fe008cea7d85"
                .to_string(),
            module: "jobs".to_string(),
            job_registry_id: "0x89bf7e1413730788703c0b50fb4b96010fb43e8ba7a5fa1fc2266311e7dbe21c"
                .to_string(),
            pool_registry_id: "0x1302caa28d05f1840c14a5759f2e63f5a46c7d493178d3b3500d5fe43ae95f8e"
                .to_string(),
            admin_cap_id: "0xfceeb97dd759c83c3939e148a34d16cb3fc12915b6d78bfed23f0f2e4e4c6694"
                .to_string(),
            enclave_object_id: "0x06e385548bc3f9b157907fdf01f1d0c60f6614b0431b1cc0a84b3da4d5a02920"
                .to_string(),
            jobs_table_id: "0xfd6bad71cdc8753f395538290c540c26fc417c451c39d0f8ee7e54db4762c16c"
                .to_string(),
            pool_users_table_id:
                "0x46ac9e7157473c72b52c96a47c737aa92ff1784837f50f7fd1d5ca54fa15ebfd".to_string(),
            pool_data_table_id: "0xf73a9e758b78ab349005aefa731c1ad59860b7302cefb074e957247772b3912a"
                .to_string(),
        }
    }
}

impl ContractConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            package_id: env_or("CLOAKX_PACKAGE_ID", defaults.package_id),
            module: env_or("CLOAKX_MODULE", defaults.module),
            job_registry_id: env_or("JOB_REGISTRY_ID", defaults.job_registry_id),
            pool_registry_id: env_or("POOL_REGISTRY_ID", defaults.pool_registry_id),
            admin_cap_id: env_or("ADMIN_CAP_ID", defaults.admin_cap_id),
            enclave_object_id: env_or("ENCLAVE_OBJECT_ID", defaults.enclave_object_id),
            jobs_table_id: env_or("JOBS_TABLE_ID", defaults.jobs_table_id),
            pool_users_table_id: env_or("POOL_USERS_TABLE_ID", defaults.pool_users_table_id),
            pool_data_table_id: env_or("POOL_DATA_TABLE_ID", defaults.pool_data_table_id),
        }
    }

    fn object_ids(&self) -> [(&'static str, &str); 8] {
        [
            ("package_id", self.package_id.as_str()),
            ("job_registry_id", self.job_registry_id.as_str()),
            ("pool_registry_id", self.pool_registry_id.as_str()),
            ("admin_cap_id", self.admin_cap_id.as_str()),
            ("enclave_object_id", self.enclave_object_id.as_str()),
            ("jobs_table_id", self.jobs_table_id.as_str()),
            ("pool_users_table_id", self.pool_users_table_id.as_str()),
            ("pool_data_table_id", self.pool_data_table_id.as_str()),
        ]
    }
}

/// Relay configuration
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection string for the cursor and job tables
    pub database_url: String,

    /// Ledger fullnode JSON-RPC endpoint
    pub sui_rpc_url: String,

    /// Secure compute service base URL
    pub nautilus_url: String,

    /// Base64 ed25519 secret of the operator account holding the admin cap
    pub admin_private_key: String,

    pub contract: ContractConfig,

    /// Delay between polls once the event log is drained
    pub poll_interval: Duration,

    /// Maximum events requested per poll
    pub event_page_size: usize,

    /// Gas budget (MIST) of a `complete_job` transaction
    pub gas_budget: u64,

    /// Capacity of the ingestion -> pipeline handoff queue
    pub pipeline_queue_depth: usize,

    /// Address of the health/admin HTTP surface
    pub bind_addr: String,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(database_url: String, admin_private_key: String) -> Self {
        Self {
            database_url,
            sui_rpc_url: "https://fullnode.testnet.sui.io:443".to_string(),
            nautilus_url: "http://localhost:3000".to_string(),
            admin_private_key,
            contract: ContractConfig::default(),
            poll_interval: Duration::from_millis(5_000),
            event_page_size: 50,
            gas_budget: 100_000_000,
            pipeline_queue_depth: 16,
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - DATABASE_URL (required)
    /// - ADMIN_PRIVATE_KEY (required)
    /// - SUI_RPC_URL, NAUTILUS_URL (optional)
    /// - CLOAKX_PACKAGE_ID, CLOAKX_MODULE and the object/table ids (optional)
    /// - POLL_INTERVAL_MS (optional, default: 5000)
    /// - EVENT_PAGE_SIZE (optional, default: 50)
    /// - GAS_BUDGET (optional, default: 100000000)
    /// - PIPELINE_QUEUE_DEPTH (optional, default: 16)
    /// - RELAY_BIND_ADDR (optional, default: 0.0.0.0:8080)
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable not set"))?;

        let admin_private_key = std::env::var("ADMIN_PRIVATE_KEY")
            .map_err(|_| anyhow::anyhow!("ADMIN_PRIVATE_KEY environment variable not set"))?;

        let defaults = Self::new(database_url, admin_private_key);

        let poll_interval = std::env::var("POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);

        let event_page_size = std::env::var("EVENT_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.event_page_size);

        let gas_budget = std::env::var("GAS_BUDGET")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.gas_budget);

        let pipeline_queue_depth = std::env::var("PIPELINE_QUEUE_DEPTH")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.pipeline_queue_depth);

        Ok(Self {
            sui_rpc_url: env_or("SUI_RPC_URL", defaults.sui_rpc_url),
            nautilus_url: env_or("NAUTILUS_URL", defaults.nautilus_url),
            contract: ContractConfig::from_env(),
            bind_addr: env_or("RELAY_BIND_ADDR", defaults.bind_addr),
            poll_interval,
            event_page_size,
            gas_budget,
            pipeline_queue_depth,
            database_url: defaults.database_url,
            admin_private_key: defaults.admin_private_key,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.is_empty() {
            anyhow::bail!("database_url cannot be empty");
        }

        if self.admin_private_key.trim().is_empty() {
            anyhow::bail!("admin_private_key cannot be empty");
        }

        for (name, url) in [
            ("sui_rpc_url", &self.sui_rpc_url),
            ("nautilus_url", &self.nautilus_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        if self.contract.module.is_empty() {
            anyhow::bail!("module cannot be empty");
        }

        for (name, id) in self.contract.object_ids() {
            if !id.starts_with("0x") || hex::decode(pad_hex(&id[2..])).is_err() {
                anyhow::bail!("{} must be a 0x-prefixed hex object id", name);
            }
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.event_page_size == 0 {
            anyhow::bail!("event_page_size must be greater than 0");
        }

        if self.pipeline_queue_depth == 0 {
            anyhow::bail!("pipeline_queue_depth must be greater than 0");
        }

        Ok(())
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}

// Short ids such as `0x2` are valid on-chain.
fn pad_hex(s: &str) -> String {
    if s.len() % 2 == 1 {
        format!("0{}", s)
    } else {
        s.to_string()
    }
}
