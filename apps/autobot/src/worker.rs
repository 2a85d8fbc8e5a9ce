//! Automation run lifecycle: fatal preconditions, capability wiring, background launch.
//!
//! A run is one sequential task. The façade hands it a [`RunConfig`] once and gets
//! nothing back; only one run may be active at a time.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::browser::{BrowserDriver, Pacer, WebDriverBrowser};
use crate::config::{Config, RunConfig};
use crate::engine::application::ApplicationMachine;
use crate::engine::oracle::AnswerOracle;
use crate::engine::resolution::FieldResolver;
use crate::engine::{RunController, RunSummary};
use crate::errors::{AppError, RunError};
use crate::llm_client::{LanguageModel, LlmClient};
use crate::resume::ResumeCorpus;
use crate::vision::{ImageToText, TesseractOcr};

/// Checks preconditions, builds the production capabilities and runs to completion.
pub async fn execute(config: &Config, run: &RunConfig) -> Result<RunSummary, RunError> {
    run.validate()?;

    let resume = ResumeCorpus::from_pdf(Path::new(&run.cv_path)).await?;
    let llm = LlmClient::new(run.groq_api_key.clone(), config.groq_model.clone())?;
    info!("LLM client initialized (model: {})", llm.model());
    let ocr = TesseractOcr::default();
    let pacer = Pacer::human();

    let browser = WebDriverBrowser::connect(&config.webdriver_url, config.headless).await?;
    let result = drive(&browser, config, run, &resume, &llm, &ocr, &pacer).await;
    if let Err(e) = browser.close().await {
        warn!("Failed to close browser session: {e}");
    }
    result
}

/// Logs in and runs the job loop against any browser.
pub async fn drive<D: BrowserDriver + ?Sized>(
    browser: &D,
    config: &Config,
    run: &RunConfig,
    resume: &ResumeCorpus,
    model: &dyn LanguageModel,
    vision: &dyn ImageToText,
    pacer: &Pacer,
) -> Result<RunSummary, RunError> {
    let oracle = AnswerOracle::new(&run.preferences, resume, model);
    let resolver = FieldResolver::new(browser, pacer, vision, &oracle);
    let machine = ApplicationMachine::new(browser, pacer, &resolver, &run.preferences);
    let controller = RunController::new(browser, pacer, machine, config.max_pages);

    controller
        .login(&run.linkedin_email, &run.linkedin_password)
        .await?;
    Ok(controller.run(&config.search_url).await)
}

/// Set while a run is active.
#[derive(Debug, Clone, Default)]
pub struct RunGuard(Arc<AtomicBool>);

/// Releases the guard when dropped.
#[derive(Debug)]
pub struct RunPermit(Arc<AtomicBool>);

impl RunGuard {
    pub fn try_acquire(&self) -> Option<RunPermit> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit(self.0.clone()))
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Starts runs on behalf of the HTTP façade. Swappable so routes can be tested
/// without a browser.
pub trait RunLauncher: Send + Sync {
    fn is_running(&self) -> bool;

    fn launch(&self, run: RunConfig) -> Result<Uuid, AppError>;
}

pub struct WorkerLauncher {
    config: Config,
    guard: RunGuard,
}

impl WorkerLauncher {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            guard: RunGuard::default(),
        }
    }
}

impl RunLauncher for WorkerLauncher {
    fn is_running(&self) -> bool {
        self.guard.is_active()
    }

    fn launch(&self, run: RunConfig) -> Result<Uuid, AppError> {
        let permit = self.guard.try_acquire().ok_or_else(|| {
            AppError::Conflict("An automation run is already in progress".to_string())
        })?;

        let run_id = Uuid::new_v4();
        let config = self.config.clone();
        let span = tracing::info_span!("run", %run_id);
        tokio::spawn(
            async move {
                let _permit = permit;
                info!("Automation run started");
                if let Err(e) = execute(&config, &run).await {
                    error!("Automation run aborted: {e}");
                }
            }
            .instrument(span),
        );
        Ok(run_id)
    }
}
