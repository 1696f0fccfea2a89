//! Application service: build the provisioning plan for a deployment.
//!
//! Loads template assets through `TemplateSource`, then hands off to the
//! pure sequence builder.

use anyhow::{Context, Result};

use crate::application::ports::TemplateSource;
use crate::domain::deploy::DeployConfig;
use crate::domain::redact::Redactor;
use crate::domain::sequence::{SetupPlan, Templates, assets, build_setup_plan, generate_gateway_token};

/// Read every template the builder needs.
///
/// # Errors
///
/// Returns an error naming the first asset that cannot be read.
pub fn load_templates(source: &impl TemplateSource) -> Result<Templates> {
    let read = |path: &str| {
        source
            .template(path)
            .with_context(|| format!("cannot load template {path}"))
    };
    Ok(Templates {
        aibtc_skill: read(assets::AIBTC_SKILL)?,
        moltbook_skill: read(assets::MOLTBOOK_SKILL)?,
        user_md: read(assets::USER_MD)?,
        state_json: read(assets::STATE_JSON)?,
        identity_md: read(assets::IDENTITY_MD)?,
        journal_md: read(assets::JOURNAL_MD)?,
        portfolio_json: read(assets::PORTFOLIO_JSON)?,
        preferences_json: read(assets::PREFERENCES_JSON)?,
        relationships_json: read(assets::RELATIONSHIPS_JSON)?,
        memory_readme: read(assets::MEMORY_README)?,
    })
}

/// Build the full setup plan with a freshly generated gateway token.
///
/// # Errors
///
/// Returns an error if a template is missing or the config is invalid.
pub fn build_plan(source: &impl TemplateSource, config: &DeployConfig) -> Result<SetupPlan> {
    let templates = load_templates(source)?;
    let token = generate_gateway_token();
    build_setup_plan(config, &templates, &token).context("cannot build provisioning plan")
}

/// One entry of a plan as shown to the user: secrets masked.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PlannedCommand {
    pub index: usize,
    pub command: String,
}

/// Redacted view of `plan`. `full` keeps every line of each command instead
/// of the one-line label.
#[must_use]
pub fn describe_plan(plan: &SetupPlan, full: bool) -> Vec<PlannedCommand> {
    let redactor = Redactor::new(plan.secrets.iter().cloned());
    plan.commands
        .iter()
        .enumerate()
        .map(|(index, command)| PlannedCommand {
            index,
            command: if full {
                redactor.redact(command)
            } else {
                redactor.label(command)
            },
        })
        .collect()
}
