use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::core::accounts::Account;
use crate::core::autorun::AutoRunConfig;
use crate::core::calendar::CalendarConfig;
use crate::core::jobs::engine::EngineConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_host: String,
    pub api_port: u16,
    pub heartbeat_secs: u64,
    pub automation_api: AutomationApiSection,
    pub generation: GenerationSection,
    pub delays: DelaySection,
    pub engine: EngineSection,
    pub autorun: AutoRunSection,
    pub accounts: Vec<Account>,
    pub cashtags: CashtagSection,
    pub raid_targets: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AutomationApiSection {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationSection {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
    pub system_prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DelaySection {
    /// Inter-send spacing for raid batches, seconds.
    pub raid_reply_secs: (u64, u64),
    /// Wait before the best-effort like after a reply, seconds.
    pub like_secs: (u64, u64),
    /// Wait before the follow-up DM after a reply, seconds.
    pub dm_secs: (u64, u64),
    /// Schedule jitter, minutes.
    pub schedule_jitter_minutes: (i64, i64),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub max_in_flight: usize,
    pub enable_auto_like: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AutoRunSection {
    pub max_tweets: usize,
    pub raid_rounds: (usize, usize),
    pub raid_targets_per_round: usize,
    pub dm_message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CashtagSection {
    pub pinned: Vec<String>,
    pub trending: Vec<String>,
    pub sample_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_host: "127.0.0.1".to_string(),
            api_port: 17910,
            heartbeat_secs: 25,
            automation_api: AutomationApiSection::default(),
            generation: GenerationSection::default(),
            delays: DelaySection::default(),
            engine: EngineSection::default(),
            autorun: AutoRunSection::default(),
            accounts: Vec::new(),
            cashtags: CashtagSection::default(),
            raid_targets: Vec::new(),
        }
    }
}

impl Default for AutomationApiSection {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:7700/api".to_string(),
            api_key: String::new(),
            timeout_secs: 60,
        }
    }
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 60,
            system_prompt: "Write a short, casual reply to this tweet.".to_string(),
        }
    }
}

impl Default for DelaySection {
    fn default() -> Self {
        Self {
            raid_reply_secs: (47, 88),
            like_secs: (5, 10),
            dm_secs: (30, 90),
            schedule_jitter_minutes: (2, 15),
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_in_flight: 3,
            enable_auto_like: false,
        }
    }
}

impl Default for AutoRunSection {
    fn default() -> Self {
        Self {
            max_tweets: 10,
            raid_rounds: (2, 4),
            raid_targets_per_round: 3,
            dm_message: "Appreciate the engagement, check your mentions.".to_string(),
        }
    }
}

impl Default for CashtagSection {
    fn default() -> Self {
        Self {
            pinned: Vec::new(),
            trending: Vec::new(),
            sample_size: 2,
        }
    }
}

impl Config {
    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config at {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config at {}", path.display()))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tick_interval: Duration::from_secs(1),
            max_in_flight: self.engine.max_in_flight,
            dm_delay_secs: self.delays.dm_secs,
            like_delay_secs: self.delays.like_secs,
            enable_auto_like: self.engine.enable_auto_like,
        }
    }

    pub fn autorun_config(&self) -> AutoRunConfig {
        AutoRunConfig {
            max_tweets: self.autorun.max_tweets,
            reply_spacing_secs: self.delays.raid_reply_secs,
            raid_spacing_secs: self.delays.raid_reply_secs,
            raid_rounds: self.autorun.raid_rounds,
            pinned_cashtags: self.cashtags.pinned.clone(),
            trending_cashtags: self.cashtags.trending.clone(),
            cashtag_sample: self.cashtags.sample_size,
            raid_targets: self.raid_targets.clone(),
            raid_targets_per_round: self.autorun.raid_targets_per_round,
            system_prompt: self.generation.system_prompt.clone(),
            dm_message: self.autorun.dm_message.clone(),
            observe_interval: Duration::from_secs(1),
        }
    }

    pub fn calendar_config(&self) -> CalendarConfig {
        CalendarConfig {
            jitter_minutes: self.delays.schedule_jitter_minutes,
            tick_interval: Duration::from_secs(60),
        }
    }
}
