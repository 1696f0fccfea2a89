//! Sequence builder: renders a `DeployConfig` into the ordered shell commands
//! that turn a fresh VM into an agent host.
//!
//! Pure functions only. Template contents are passed in by the caller; the
//! only non-determinism is the gateway token from [`generate_gateway_token`].
//!
//! Command layout (the executor reports progress against these indices):
//!
//! | index  | step                                              |
//! |--------|---------------------------------------------------|
//! | 0      | install docker                                    |
//! | 1      | enable and start docker                           |
//! | 2      | create directory tree                             |
//! | 3..=20 | config/template file writes, then `chown`         |
//! | 21     | `docker compose build`                            |
//! | 22     | `docker compose up -d`                            |
//! | 23     | verify the container is listed                    |

use std::fmt;

use serde_json::{Value, json};
use uuid::Uuid;

use crate::domain::deploy::{AutonomyLimits, DeployConfig};
use crate::domain::error::DeployConfigError;

/// Remote directory everything is installed under.
pub const BASE_DIR: &str = "/opt/openclaw-aibtc";

pub const GATEWAY_PORT: u16 = 18789;

/// Embedded template asset paths, relative to the asset root.
pub mod assets {
    pub const AIBTC_SKILL: &str = "skills/aibtc/SKILL.md";
    pub const MOLTBOOK_SKILL: &str = "skills/moltbook/SKILL.md";
    pub const USER_MD: &str = "templates/USER.md";
    pub const STATE_JSON: &str = "templates/memory/state.json";
    pub const IDENTITY_MD: &str = "templates/memory/identity.md";
    pub const JOURNAL_MD: &str = "templates/memory/journal.md";
    pub const PORTFOLIO_JSON: &str = "templates/memory/portfolio.json";
    pub const PREFERENCES_JSON: &str = "templates/memory/preferences.json";
    pub const RELATIONSHIPS_JSON: &str = "templates/memory/relationships.json";
    pub const MEMORY_README: &str = "templates/memory/README.md";

    pub const ALL: &[&str] = &[
        AIBTC_SKILL,
        MOLTBOOK_SKILL,
        USER_MD,
        STATE_JSON,
        IDENTITY_MD,
        JOURNAL_MD,
        PORTFOLIO_JSON,
        PREFERENCES_JSON,
        RELATIONSHIPS_JSON,
        MEMORY_README,
    ];
}

/// Ordered shell commands. Order is the only dependency model.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CommandSequence(Vec<String>);

impl CommandSequence {
    #[must_use]
    pub fn new(commands: Vec<String>) -> Self {
        Self(commands)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for CommandSequence {
    fn from(commands: Vec<String>) -> Self {
        Self(commands)
    }
}

impl FromIterator<String> for CommandSequence {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// Commands embed credentials, so only the length is printed.
impl fmt::Debug for CommandSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandSequence({} commands)", self.0.len())
    }
}

/// Text assets the builder copies onto the host.
#[derive(Debug, Clone, Default)]
pub struct Templates {
    pub aibtc_skill: String,
    pub moltbook_skill: String,
    pub user_md: String,
    pub state_json: String,
    pub identity_md: String,
    pub journal_md: String,
    pub portfolio_json: String,
    pub preferences_json: String,
    pub relationships_json: String,
    pub memory_readme: String,
}

/// Rendered commands plus the secret values embedded in them.
#[derive(Debug, Clone)]
pub struct SetupPlan {
    pub commands: CommandSequence,
    /// Values to redact from anything displayed or logged.
    pub secrets: Vec<String>,
}

/// 64 lowercase hex characters from the OS random source.
#[must_use]
pub fn generate_gateway_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Escape a value for interpolation inside single quotes.
#[must_use]
pub fn escape_shell(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// `cat` heredoc writing `content` verbatim to `path`.
#[must_use]
pub fn heredoc(path: &str, content: &str, delimiter: &str) -> String {
    format!("cat > {path} << '{delimiter}'\n{content}\n{delimiter}")
}

/// Set the authorization block of the `state.json` template to the chosen
/// autonomy level.
///
/// # Errors
///
/// Returns [`DeployConfigError::InvalidTemplate`] when the template is not
/// JSON or lacks an `authorization` object.
pub fn patch_state_json(
    template: &str,
    config: &DeployConfig,
) -> Result<String, DeployConfigError> {
    let invalid = |reason: String| DeployConfigError::InvalidTemplate {
        name: assets::STATE_JSON.to_string(),
        reason,
    };
    let mut data: Value = serde_json::from_str(template).map_err(|e| invalid(e.to_string()))?;
    let auth = data
        .get_mut("authorization")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| invalid("missing \"authorization\" object".to_string()))?;

    let limits = AutonomyLimits::for_level(config.autonomy_level);
    auth.insert(
        "autonomyLevel".to_string(),
        json!(config.autonomy_level.as_str()),
    );
    auth.insert("dailyAutoLimit".to_string(), json!(limits.daily));
    auth.insert("perTransactionLimit".to_string(), json!(limits.per_transaction));
    auth.insert("trustLevel".to_string(), json!(limits.trust));

    serde_json::to_string_pretty(&data).map_err(|e| invalid(e.to_string()))
}

/// Render the full provisioning sequence.
///
/// # Errors
///
/// Returns an error if the config fails validation or a JSON template
/// cannot be patched.
pub fn build_setup_plan(
    config: &DeployConfig,
    templates: &Templates,
    gateway_token: &str,
) -> Result<SetupPlan, DeployConfigError> {
    config.validate()?;

    let base = BASE_DIR;
    let network = config.network.as_str();
    let mut commands = Vec::with_capacity(24);

    commands.push(
        "apt-get update -qq && apt-get install -y -qq curl ca-certificates docker.io docker-compose-plugin"
            .to_string(),
    );
    commands.push("systemctl enable docker && systemctl start docker".to_string());
    commands.push(format!(
        "mkdir -p {base}/data/{{config,workspace/skills/aibtc,workspace/skills/moltbook,workspace/memory}}"
    ));

    let env_content = format!(
        "OPENROUTER_API_KEY={}\nTELEGRAM_BOT_TOKEN={}\nNETWORK={network}\nOPENCLAW_GATEWAY_TOKEN={gateway_token}",
        escape_shell(&config.openrouter_key),
        escape_shell(&config.telegram_token),
    );
    commands.push(heredoc(&format!("{base}/.env"), &env_content, "ENVEOF"));
    commands.push(heredoc(
        &format!("{base}/Dockerfile"),
        &dockerfile(network),
        "DOCKEREOF",
    ));
    commands.push(heredoc(
        &format!("{base}/docker-compose.yml"),
        &compose_file(),
        "COMPOSEEOF",
    ));
    commands.push(heredoc(
        &format!("{base}/data/config/mcporter.json"),
        &pretty(&mcporter_config()),
        "MCPORTEREOF",
    ));
    commands.push(heredoc(
        &format!("{base}/data/openclaw.json"),
        &pretty(&openclaw_config(&config.model, &config.telegram_token, gateway_token)),
        "OPENCLAWEOF",
    ));

    let workspace = format!("{base}/data/workspace");
    commands.push(heredoc(
        &format!("{workspace}/skills/aibtc/SKILL.md"),
        templates.aibtc_skill.trim_end(),
        "SKILLEOF",
    ));
    commands.push(heredoc(
        &format!("{workspace}/skills/moltbook/SKILL.md"),
        templates.moltbook_skill.trim_end(),
        "MOLTEOF",
    ));
    commands.push(heredoc(
        &format!("{workspace}/USER.md"),
        templates.user_md.trim_end(),
        "USERMDEOF",
    ));

    let wallet_password = escape_shell(&config.wallet_password);
    for path in [
        format!("{base}/data/config/.wallet_password"),
        format!("{workspace}/.pending_wallet_password"),
    ] {
        commands.push(format!(
            "printf '%s' '{wallet_password}' > {path} && chmod 600 {path}"
        ));
    }

    let memory = format!("{workspace}/memory");
    commands.push(heredoc(
        &format!("{memory}/state.json"),
        &patch_state_json(&templates.state_json, config)?,
        "STATEJSONEOF",
    ));
    for (file, content, delimiter) in [
        ("identity.md", &templates.identity_md, "IDENTITYEOF"),
        ("journal.md", &templates.journal_md, "JOURNALEOF"),
        ("portfolio.json", &templates.portfolio_json, "PORTFOLIOEOF"),
        ("preferences.json", &templates.preferences_json, "PREFERENCESEOF"),
        ("relationships.json", &templates.relationships_json, "RELATIONSHIPSEOF"),
        ("README.md", &templates.memory_readme, "MEMORYREADMEEOF"),
    ] {
        commands.push(heredoc(
            &format!("{memory}/{file}"),
            content.trim_end(),
            delimiter,
        ));
    }

    // Container runs as the `node` user (UID 1000).
    commands.push(format!("chown -R 1000:1000 {base}/data"));

    commands.push(format!("cd {base} && docker compose build"));
    commands.push(format!("cd {base} && docker compose up -d"));
    commands.push(format!(
        "sleep 5 && docker compose -f {base}/docker-compose.yml ps --format json"
    ));

    Ok(SetupPlan {
        commands: CommandSequence::new(commands),
        secrets: collect_secrets(config, gateway_token),
    })
}

fn collect_secrets(config: &DeployConfig, gateway_token: &str) -> Vec<String> {
    let mut secrets = config.secrets();
    secrets.push(gateway_token.to_string());
    let escaped: Vec<String> = secrets
        .iter()
        .map(|s| escape_shell(s))
        .filter(|e| !secrets.contains(e))
        .collect();
    secrets.extend(escaped);
    secrets.retain(|s| !s.is_empty());
    secrets
}

fn dockerfile(network: &str) -> String {
    format!(
        "FROM ghcr.io/openclaw/openclaw:latest\n\
         USER root\n\
         RUN npm install -g @aibtc/mcp-server@1.13.1 mcporter@0.7.3\n\
         ENV NETWORK={network}\n\
         USER node\n\
         CMD [\"node\", \"dist/index.js\", \"gateway\", \"--bind\", \"lan\", \"--port\", \"{GATEWAY_PORT}\"]"
    )
}

fn compose_file() -> String {
    format!(
        "services:\n\
         \x20 openclaw-gateway:\n\
         \x20   build: .\n\
         \x20   container_name: openclaw-aibtc\n\
         \x20   restart: unless-stopped\n\
         \x20   environment:\n\
         \x20     - OPENROUTER_API_KEY=${{OPENROUTER_API_KEY}}\n\
         \x20     - NETWORK=${{NETWORK}}\n\
         \x20     - OPENCLAW_GATEWAY_TOKEN=${{OPENCLAW_GATEWAY_TOKEN}}\n\
         \x20     - OPENCLAW_CONFIG_PATH=/home/node/.openclaw/openclaw.json\n\
         \x20   volumes:\n\
         \x20     - ./data:/home/node/.openclaw\n\
         \x20   ports:\n\
         \x20     - \"{GATEWAY_PORT}:{GATEWAY_PORT}\""
    )
}

fn mcporter_config() -> Value {
    json!({
        "mcpServers": {
            "aibtc": {
                "command": "aibtc-mcp-server",
                "lifecycle": "keep-alive",
                "env": {},
            }
        }
    })
}

fn openclaw_config(model: &str, telegram_token: &str, gateway_token: &str) -> Value {
    json!({
        "agents": {
            "defaults": {
                "model": {"primary": model},
                "workspace": "/home/node/.openclaw/workspace",
                "maxConcurrent": 4,
            }
        },
        "commands": {"native": "auto", "nativeSkills": "auto"},
        "channels": {
            "telegram": {
                "dmPolicy": "open",
                "botToken": telegram_token,
                "allowFrom": ["*"],
                "groupPolicy": "allowlist",
                "streamMode": "partial",
            }
        },
        "gateway": {
            "port": GATEWAY_PORT,
            "mode": "local",
            "auth": {"mode": "token", "token": gateway_token},
            "controlUi": {"dangerouslyDisableDeviceAuth": true},
        },
        "plugins": {"entries": {"telegram": {"enabled": true}}},
    })
}

fn pretty(value: &Value) -> String {
    // Serializing a `Value` built from `json!` cannot fail.
    serde_json::to_string_pretty(value).unwrap_or_default()
}
