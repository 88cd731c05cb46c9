use std::path::PathBuf;

use anyhow::{Context as _, Result};
use console::style;
use fncall::agent::{Agent, RunOptions, RunStep};
use fncall::context::Context;
use fncall::models::message::Message;
use fncall::providers::openai::OpenAiProvider;
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::watch;
use tracing::info;

use crate::configuration::Settings;
use crate::functions;

pub struct RunArgs {
    pub prompt: String,
    pub config: Option<PathBuf>,
    pub max_rounds: Option<usize>,
    pub system: Option<String>,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let settings =
        Settings::load(args.config.as_deref()).context("Failed to load configuration")?;

    let mut agent_settings = settings.agent;
    if let Some(max_rounds) = args.max_rounds {
        agent_settings.max_rounds = max_rounds;
    }
    let agent_config = agent_settings.into_config()?;
    let provider = OpenAiProvider::new(settings.provider.into_config()?)?;
    let agent = Agent::new("fncall", Box::new(provider), agent_config)?;

    let mut context = build_context(args.prompt, args.system)?;

    let (cancel, cancelled) = watch::channel(false);
    tokio::spawn(async move {
        let signals = stream::unfold((), |()| async {
            tokio::signal::ctrl_c().await.ok().map(|_| ((), ()))
        });
        if wait_for_interrupts(Box::pin(signals), cancel).await {
            std::process::exit(130);
        }
    });

    let mut stream = agent.run(
        &mut context,
        RunOptions::default().with_cancel(cancelled.clone()),
    );
    while let Some(step) = stream.next().await {
        render(&step?);
    }

    if *cancelled.borrow() {
        info!("run interrupted");
        println!("{}", style("Interrupted").yellow());
    }
    Ok(())
}

/// The first interrupt cancels the run at its next checkpoint. Returns true when a
/// second interrupt arrives, meaning the caller should exit without waiting.
async fn wait_for_interrupts<S>(mut signals: S, cancel: watch::Sender<bool>) -> bool
where
    S: Stream<Item = ()> + Unpin,
{
    if signals.next().await.is_none() {
        return false;
    }
    let _ = cancel.send(true);
    eprintln!(
        "{}",
        style("Stopping after the current step, press Ctrl-C again to quit").yellow()
    );
    signals.next().await.is_some()
}

fn build_context(prompt: String, system: Option<String>) -> Result<Context> {
    let mut context = Context::new();
    if let Some(system) = system {
        context.add_message(Message::system(system));
    }
    context.add_message(Message::user(prompt));
    for function in functions::all() {
        context.add_function(function, true)?;
    }
    Ok(context)
}

fn render(step: &RunStep) {
    match step.message.as_ref() {
        Message::Assistant {
            function_call: Some(request),
            content,
        } => {
            if let Some(text) = content.as_deref().filter(|t| !t.is_empty()) {
                println!("{}", text);
            }
            println!(
                "{} {}({})",
                style(format!("[{}]", step.round)).dim(),
                style(&request.name).cyan().bold(),
                request.arguments
            );
        }
        Message::Function { name, content } => {
            println!(
                "{} {} {}",
                style(format!("[{}]", step.round)).dim(),
                style(format!("{} returned", name)).green(),
                content
            );
        }
        message => {
            if let Some(text) = message.content() {
                println!("{}", text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fncall::models::role::Role;

    #[test]
    fn test_build_context() {
        let context =
            build_context("How many words?".to_string(), Some("Be brief".to_string())).unwrap();

        let roles: Vec<_> = context.messages().iter().map(|m| m.role()).collect();
        assert_eq!(roles, [Role::System, Role::User]);
        assert_eq!(context.messages()[1].content(), Some("How many words?"));
        assert_eq!(context.functions().enabled(), ["count_words", "add"]);
    }

    #[tokio::test]
    async fn test_second_interrupt_forces_exit() {
        let (cancel, cancelled) = watch::channel(false);
        assert!(wait_for_interrupts(stream::iter(vec![(), ()]), cancel).await);
        assert!(*cancelled.borrow());
    }

    #[tokio::test]
    async fn test_single_interrupt_only_cancels() {
        let (cancel, cancelled) = watch::channel(false);
        assert!(!wait_for_interrupts(stream::iter(vec![()]), cancel).await);
        assert!(*cancelled.borrow());

        let (cancel, cancelled) = watch::channel(false);
        assert!(!wait_for_interrupts(stream::iter(Vec::<()>::new()), cancel).await);
        assert!(!*cancelled.borrow());
    }

    #[test]
    fn test_build_context_without_system() {
        let context = build_context("Hi".to_string(), None).unwrap();
        assert_eq!(context.messages().len(), 1);
    }
}
