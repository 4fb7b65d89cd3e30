//! Rule command handlers.

use std::sync::Arc;

use tabled::Tabled;

use corral_api::ApiClient;
use corral_core::cel;
use corral_core::{CorrelationForm, Rule, RuleStore, TimeUnit};

use crate::cli::{CreateRuleArgs, GlobalOpts, RulesArgs, RulesCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "CEL Rule")]
    cel: String,
    #[tabled(rename = "Grouped by")]
    grouped_by: String,
    #[tabled(rename = "Timeframe")]
    timeframe: String,
    #[tabled(rename = "Incidents")]
    incidents: u64,
}

impl From<&Arc<Rule>> for RuleRow {
    fn from(rule: &Arc<Rule>) -> Self {
        Self {
            name: rule.name.clone(),
            cel: rule.definition_cel.clone(),
            grouped_by: rule.grouping_criteria.join(" + "),
            timeframe: format_timeframe(rule),
            incidents: rule.incidents,
        }
    }
}

#[allow(clippy::as_conversions, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn format_timeframe(rule: &Rule) -> String {
    let amount = rule.display_timeframe();
    if amount.fract() == 0.0 {
        format!("{} {}", amount as u64, rule.timeunit)
    } else {
        format!("{amount} {}", rule.timeunit)
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    api: &ApiClient,
    args: RulesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        RulesCommand::List => {
            let store = RuleStore::new();
            store.refresh(api).await?;

            let snap = store.snapshot();
            let out = output::render_list(&global.output, &snap, |r| RuleRow::from(r), |r| r.id.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RulesCommand::Show { rule } => {
            let store = RuleStore::new();
            store.refresh(api).await?;

            let found = store.find(&rule).ok_or_else(|| CliError::NotFound {
                resource_type: "rule".into(),
                identifier: rule.clone(),
                list_command: "rules list".into(),
            })?;

            let out = output::render_single(&global.output, &found, rule_detail, |r| r.id.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RulesCommand::Create(create) => {
            let form = form_from_args(&create)?;
            let body = form.to_create_body();
            let record = api.create_rule(&body).await.map_err(util::api_err)?;

            if !global.quiet {
                eprintln!("Rule '{}' created ({})", record.name, record.id);
            }
            Ok(())
        }

        RulesCommand::Delete { rule } => {
            let store = RuleStore::new();
            store.refresh(api).await?;

            let found = store.find(&rule).ok_or_else(|| CliError::NotFound {
                resource_type: "rule".into(),
                identifier: rule.clone(),
                list_command: "rules list".into(),
            })?;

            if !util::confirm(
                &format!("Delete rule '{}'? This is destructive.", found.name),
                global.yes,
            )? {
                return Ok(());
            }

            api.delete_rule(&found.id).await.map_err(util::api_err)?;
            if !global.quiet {
                eprintln!("Rule deleted");
            }
            Ok(())
        }
    }
}

/// Build the authoring form from CLI flags, validating the CEL text.
fn form_from_args(args: &CreateRuleArgs) -> Result<CorrelationForm, CliError> {
    let time_unit: TimeUnit = args.unit.parse().map_err(|_| CliError::Validation {
        field: "unit".into(),
        reason: format!(
            "expected seconds, minutes, hours, or days, got '{}'",
            args.unit
        ),
    })?;

    let query = cel::parse(&args.cel)
        .map_err(CliError::from)?
        .into_form_group();

    Ok(CorrelationForm {
        name: args.name.clone(),
        description: args.description.clone().unwrap_or_default(),
        time_amount: args.timeframe,
        time_unit,
        grouped_attributes: args.group_by.clone(),
        require_approve: args.require_approve,
        query,
        ..CorrelationForm::default()
    })
}

/// Multi-line detail view for `rules show` in table mode.
fn rule_detail(rule: &Arc<Rule>) -> String {
    let mut out = String::new();
    let mut line = |label: &str, value: String| {
        out.push_str(&format!("{label:<16}{value}\n"));
    };

    line("Name:", rule.name.clone());
    line("Id:", rule.id.clone());
    line("CEL:", rule.definition_cel.clone());
    line("Grouped by:", rule.grouping_criteria.join(" + "));
    line("Timeframe:", format_timeframe(rule));
    line("Resolve on:", rule.resolve_on.to_string());
    line("Approval:", if rule.require_approve { "required".into() } else { "not required".into() });
    line("Incidents:", rule.incidents.to_string());
    if let Some(ref desc) = rule.group_description {
        line("Description:", desc.clone());
    }
    if let Some(created) = rule.creation_time {
        let by = rule.created_by.as_deref().unwrap_or("unknown");
        line("Created:", format!("{} by {by}", created.format("%Y-%m-%d %H:%M:%S UTC")));
    }

    // The parsed query tree, as the sidebar form would see it.
    match CorrelationForm::from_rule(rule) {
        Ok(form) => {
            let tree = serde_json::to_string_pretty(&form.query)
                .unwrap_or_else(|_| "<unrenderable>".into());
            out.push_str("Query tree:\n");
            out.push_str(&tree);
        }
        Err(e) => {
            out.push_str(&format!("Query tree:     <unparsable: {e}>"));
        }
    }

    out
}
