use std::sync::Arc;

use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use hab_core::{
    config::Config,
    errors::Error,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    orchestrator::AlarmBot,
    state::Store,
};
use hab_device::DeviceClient;
use hab_listener::ListenerState;
use hab_telegram::TelegramMessenger;

#[tokio::main]
async fn main() -> Result<(), Error> {
    hab_core::logging::init("hab")?;

    // Missing token / base URL is fatal before anything starts.
    let cfg = Arc::new(Config::load()?);
    tracing::info!(
        device = %cfg.device_base_url,
        listen = %cfg.listen_addr,
        "configuration loaded"
    );

    let tg = hab_telegram::router::build_bot(&cfg)
        .map_err(|e| Error::Config(format!("telegram client: {e}")))?;

    // Wrap the raw Telegram messenger with a throttling decorator.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(tg.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));
    let device = Arc::new(DeviceClient::new(
        cfg.device_base_url.clone(),
        cfg.device_timeout,
    )?);
    let bot = Arc::new(AlarmBot::new(Arc::new(Store::new()), device, messenger));

    // Bind before polling starts so a taken port stops the process right away.
    let listener = hab_listener::bind(cfg.listen_addr).await?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("shutdown requested");
                    cancel.cancel();
                }
                Err(e) => tracing::error!("cannot listen for Ctrl-C, running without it: {e}"),
            }
        });
    }

    let mut listener_task = tokio::spawn(hab_listener::serve(
        listener,
        ListenerState::new(bot.clone()),
        cfg.video_max_bytes,
        cancel.clone(),
    ));
    let cancel_for_polling = cancel.clone();
    let mut polling_task = tokio::spawn(async move {
        hab_telegram::router::run_polling(tg, bot, cfg, cancel_for_polling)
            .await
            .map_err(|e| Error::External(format!("telegram polling failed: {e}")))
    });

    // Whichever task ends first takes the other one down with it.
    tokio::select! {
        res = &mut listener_task => {
            cancel.cancel();
            let polled = polling_task.await;
            joined("listener", res)?;
            joined("polling", polled)
        }
        res = &mut polling_task => {
            cancel.cancel();
            let served = listener_task.await;
            joined("polling", res)?;
            joined("listener", served)
        }
    }
}

fn joined(task: &str, res: Result<Result<(), Error>, JoinError>) -> Result<(), Error> {
    match res {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            tracing::error!("{task} stopped: {e}");
            Err(e)
        }
        Err(e) => Err(Error::External(format!("{task} task: {e}"))),
    }
}
