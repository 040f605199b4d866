//! The USSD run: dial, get past the SIM chooser, read the operator's answer

use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::dial;
use crate::config::{labels_for_slot, mentions_slot, UssdTimingConfig, SIM_LABELS};
use crate::device::DeviceCommands;
use crate::error::Result;
use crate::protocol::UssdResult;
use crate::ui::hierarchy::{longest_text, parse_hierarchy};
use crate::ui::{UiAutomationBackend, UiBackendKind, UiNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UssdState {
    Idle,
    Dialing,
    ResolvingSimPrompt,
    AwaitingResponse,
    Captured,
    Failed,
}

impl fmt::Display for UssdState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UssdState::Idle => "idle",
            UssdState::Dialing => "dialing",
            UssdState::ResolvingSimPrompt => "resolving-sim-prompt",
            UssdState::AwaitingResponse => "awaiting-response",
            UssdState::Captured => "captured",
            UssdState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Everything a run went through, for callers that want more than the result.
#[derive(Debug, Clone)]
pub struct UssdReport {
    pub result: UssdResult,
    pub trace: Vec<UssdState>,
    pub dial_variant: Option<&'static str>,
    pub prompt_resolved_by: Option<UiBackendKind>,
}

struct Run {
    code: String,
    sim: u8,
    trace: Vec<UssdState>,
    dial_variant: Option<&'static str>,
    prompt_resolved_by: Option<UiBackendKind>,
}

impl Run {
    fn new(code: &str, sim: u8) -> Self {
        Self {
            code: code.to_string(),
            sim,
            trace: vec![UssdState::Idle],
            dial_variant: None,
            prompt_resolved_by: None,
        }
    }

    fn enter(&mut self, state: UssdState) {
        let from = self.trace.last().copied().unwrap_or(UssdState::Idle);
        info!(code = %self.code, sim = self.sim, "USSD {} -> {}", from, state);
        self.trace.push(state);
    }

    fn finish(mut self, result: UssdResult) -> UssdReport {
        self.enter(if result.ok {
            UssdState::Captured
        } else {
            UssdState::Failed
        });
        UssdReport {
            result,
            trace: self.trace,
            dial_variant: self.dial_variant,
            prompt_resolved_by: self.prompt_resolved_by,
        }
    }
}

/// Drives USSD runs over an ordered list of UI strategies.
///
/// Runs are serialised: the dialer UI is one shared surface.
pub struct UssdAutomator {
    strategies: Vec<Arc<dyn UiAutomationBackend>>,
    timing: UssdTimingConfig,
    session: Mutex<()>,
}

impl UssdAutomator {
    pub fn new(strategies: Vec<Arc<dyn UiAutomationBackend>>, timing: UssdTimingConfig) -> Self {
        Self {
            strategies,
            timing,
            session: Mutex::new(()),
        }
    }

    pub fn strategies(&self) -> &[Arc<dyn UiAutomationBackend>] {
        &self.strategies
    }

    /// Whether a run is in progress.
    pub fn is_busy(&self) -> bool {
        self.session.try_lock().is_err()
    }

    pub async fn run(&self, device: &dyn DeviceCommands, code: &str, sim: u8) -> UssdResult {
        self.execute(device, code, sim).await.result
    }

    pub async fn execute(&self, device: &dyn DeviceCommands, code: &str, sim: u8) -> UssdReport {
        let _session = self.session.lock().await;
        let code = code.trim();
        let mut run = Run::new(code, sim);

        if code.is_empty() {
            return run.finish(UssdResult::failed("empty ussd code"));
        }

        run.enter(UssdState::Dialing);
        match dial::dial(device, code, sim).await {
            Ok(variant) => run.dial_variant = Some(variant),
            Err(e) => {
                warn!("USSD {} could not be dialed: {}", code, e);
                return run.finish(UssdResult::failed("dial failed"));
            }
        }

        run.enter(UssdState::ResolvingSimPrompt);
        tokio::time::sleep(self.timing.prompt_settle()).await;
        run.prompt_resolved_by = self.resolve_sim_prompt(sim).await;
        if run.prompt_resolved_by.is_none() {
            debug!("no SIM chooser answered, continuing");
        }

        run.enter(UssdState::AwaitingResponse);
        tokio::time::sleep(self.timing.response_settle()).await;
        let (raw_ui, ussd_text) = self.capture_response().await;

        run.finish(UssdResult::captured(raw_ui, ussd_text))
    }

    /// Up to `prompt_max_attempts` passes over the strategies; the first
    /// click ends the search.
    async fn resolve_sim_prompt(&self, sim: u8) -> Option<UiBackendKind> {
        let labels = labels_for_slot(sim);
        let attempts = self.timing.prompt_max_attempts.max(1);

        for attempt in 1..=attempts {
            for strategy in &self.strategies {
                match choose_sim(strategy.as_ref(), &labels, sim).await {
                    Ok(true) => {
                        info!(
                            "SIM {} chosen by {} backend on attempt {}",
                            u16::from(sim) + 1,
                            strategy.kind(),
                            attempt
                        );
                        return Some(strategy.kind());
                    }
                    Ok(false) => {}
                    Err(e) => debug!("{} backend could not inspect the screen: {}", strategy.kind(), e),
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.timing.prompt_retry()).await;
            }
        }
        None
    }

    /// One hierarchy snapshot from the first strategy able to give one.
    async fn capture_response(&self) -> (Option<String>, Option<String>) {
        for strategy in &self.strategies {
            match strategy.dump_hierarchy().await {
                Ok(xml) => {
                    let text = longest_text(&parse_hierarchy(&xml));
                    debug!("USSD response text: {:?}", text);
                    return (Some(xml), text);
                }
                Err(e) => warn!("{} backend could not dump the screen: {}", strategy.kind(), e),
            }
        }
        (None, None)
    }
}

/// Click the element naming `sim`, else the `sim`-th offered choice.
async fn choose_sim(ui: &dyn UiAutomationBackend, labels: &[&str], sim: u8) -> Result<bool> {
    if let Some(node) = ui.find_by_labels(labels).await? {
        if ui.click(&node).await? {
            return Ok(true);
        }
    }

    // Nth button, not Nth candidate: chooser rows are buttons, titles are text views.
    let choices = ui.buttons().await?;
    if !looks_like_chooser(&choices) {
        return Ok(false);
    }
    match choices.get(sim as usize) {
        Some(node) => {
            debug!("no label for SIM {} on screen, picking choice #{}", sim, sim);
            ui.click(node).await
        }
        None => Ok(false),
    }
}

/// A SIM chooser names at least one slot on its buttons. A response
/// dialog's lone "OK" does not.
fn looks_like_chooser(choices: &[UiNode]) -> bool {
    choices
        .iter()
        .filter_map(UiNode::label)
        .any(|label| SIM_LABELS.values().any(|slot| mentions_slot(label, *slot)))
}
