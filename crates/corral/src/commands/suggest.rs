//! Suggestion command handlers: the generation flow end to end.

use std::io::IsTerminal;
use std::time::Duration;

use owo_colors::OwoColorize;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use corral_api::ApiClient;
use corral_api::push::{PushConfig, PushHandle, ReconnectConfig};
use corral_core::{
    RuleStore, RuleSuggestion, SuggestionFeed, SuggestionReport, SuggestionTracker,
    await_generation_with_timeout,
};

use crate::cli::{GlobalOpts, SuggestArgs, SuggestCommand, SuggestRunArgs, SuggestWatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct SuggestionRow {
    #[tabled(rename = "Short Rule Name")]
    name: String,
    #[tabled(rename = "Score")]
    score: u32,
    #[tabled(rename = "CEL Rule")]
    cel: String,
    #[tabled(rename = "Timeframe")]
    timeframe: String,
    #[tabled(rename = "Group By")]
    group_by: String,
}

impl From<&RuleSuggestion> for SuggestionRow {
    fn from(s: &RuleSuggestion) -> Self {
        Self {
            name: s.short_name.clone(),
            score: s.score,
            cel: s.cel_rule.clone(),
            timeframe: format!("{} minutes", s.timeframe_minutes),
            group_by: s.group_by.join(", "),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    api: &ApiClient,
    push_config: Option<PushConfig>,
    profile_name: &str,
    args: SuggestArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let push_config = push_config.ok_or_else(|| CliError::NoPushConfig {
        profile: profile_name.to_owned(),
    })?;

    match args.command {
        SuggestCommand::Run(run) => run_generation(api, push_config, run, global).await,
        SuggestCommand::Watch(watch) => watch_feed(api, push_config, watch, global).await,
    }
}

// ── One-shot generation (per-task correlation) ──────────────────────

async fn run_generation(
    api: &ApiClient,
    push_config: PushConfig,
    run: SuggestRunArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let cancel = CancellationToken::new();
    let push = PushHandle::connect(push_config, ReconnectConfig::default(), cancel.clone())
        .map_err(util::api_err)?;

    let bar = (!global.quiet && std::io::stderr().is_terminal()).then(|| {
        util::spinner("Generating suggestions -- this can take a few minutes")
    });

    let result = await_generation_with_timeout(api, &push, Duration::from_secs(run.wait)).await;

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    push.shutdown();

    let report = result?;
    print_report(&report, global);

    let selected = select_suggestions(&report, &run)?;
    if selected.is_empty() {
        return Ok(());
    }

    submit_selected(api, &selected, global).await
}

fn print_report(report: &SuggestionReport, global: &GlobalOpts) {
    if !global.quiet {
        if let Some(ref summary) = report.summary {
            eprintln!("{summary}");
        }
    }

    let out = output::render_list(
        &global.output,
        &report.suggestions,
        |s| SuggestionRow::from(s),
        |s| s.short_name.clone(),
    );
    output::print_output(&out, global.quiet);
}

/// Work out which suggestions to persist, per flags or interactively.
fn select_suggestions<'a>(
    report: &'a SuggestionReport,
    run: &SuggestRunArgs,
) -> Result<Vec<&'a RuleSuggestion>, CliError> {
    if run.add_all {
        return Ok(report.suggestions.iter().collect());
    }

    if !run.add.is_empty() {
        let mut selected = Vec::new();
        for name in &run.add {
            let found = report
                .suggestions
                .iter()
                .find(|s| &s.short_name == name)
                .ok_or_else(|| CliError::NotFound {
                    resource_type: "suggestion".into(),
                    identifier: name.clone(),
                    list_command: "suggest run".into(),
                })?;
            selected.push(found);
        }
        return Ok(selected);
    }

    if run.pick && !report.suggestions.is_empty() {
        let names: Vec<&str> = report
            .suggestions
            .iter()
            .map(|s| s.short_name.as_str())
            .collect();
        let picked = dialoguer::MultiSelect::new()
            .with_prompt("Suggestions to add (space to toggle, enter to confirm)")
            .items(&names)
            .interact()
            .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
        return Ok(picked
            .into_iter()
            .filter_map(|i| report.suggestions.get(i))
            .collect());
    }

    Ok(Vec::new())
}

/// Submit each selected suggestion; one row's failure never stops the
/// rest, and a success marks that key as added for good.
async fn submit_selected(
    api: &ApiClient,
    selected: &[&RuleSuggestion],
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let tracker = SuggestionTracker::new();
    let mut added = 0usize;

    for suggestion in selected {
        match tracker.submit(api, suggestion).await {
            Ok(rule) => {
                added += 1;
                if !global.quiet {
                    let mark = if color {
                        "Added".green().to_string()
                    } else {
                        "Added".to_string()
                    };
                    eprintln!("{mark} '{}' as rule {}", rule.name, rule.id);
                }
            }
            Err(e) => {
                let mark = if color {
                    "Failed".red().to_string()
                } else {
                    "Failed".to_string()
                };
                eprintln!("{mark} '{}': {e}", suggestion.short_name);
            }
        }
    }

    // Revalidate the rules list after any successful add.
    if added > 0 {
        let store = RuleStore::new();
        if let Ok(count) = store.refresh(api).await {
            if !global.quiet {
                eprintln!("Rules list refreshed ({count} rules)");
            }
        }
    }

    Ok(())
}

// ── Shared-channel watcher ──────────────────────────────────────────

async fn watch_feed(
    api: &ApiClient,
    push_config: PushConfig,
    watch: SuggestWatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let cancel = CancellationToken::new();
    let push = PushHandle::connect(push_config, ReconnectConfig::default(), cancel.clone())
        .map_err(util::api_err)?;

    let feed = SuggestionFeed::new(&push);
    let mut binding = feed.bind();

    if watch.trigger {
        feed.request_refresh(api).await?;
        if !global.quiet {
            eprintln!("Generation triggered");
        }
    }

    if !global.quiet {
        eprintln!("Watching for suggestion batches (ctrl-c to stop)");
    }

    let mut seen = 0u64;
    while watch.count.is_none_or(|n| seen < n) {
        match binding.next_batch().await {
            Some(Ok(report)) => {
                seen += 1;
                print_report(&report, global);
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "skipping undecodable batch");
            }
            None => break,
        }
    }

    push.shutdown();
    Ok(())
}
