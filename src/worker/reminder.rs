use mongodb::bson::DateTime;
use tokio::time::{interval, Duration, MissedTickBehavior};
use crate::errors::AppResult;
use crate::services::{notifier, MongoService, Notifier};

/// Background loop that chases tasks past their deadline. Each task is
/// flagged once per deadline; moving the deadline re-arms it.
pub async fn reminder_process(mongo: MongoService, notifier: Notifier, every: Duration) {
    tracing::info!("Reminder worker started (every {}s)", every.as_secs());

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match sweep_overdue(&mongo, &notifier).await {
            Ok(0) => tracing::trace!("No overdue tasks"),
            Ok(count) => tracing::info!("Flagged {} overdue task(s)", count),
            Err(e) => tracing::error!("Overdue sweep failed: {}", e),
        }
    }
}

pub async fn sweep_overdue(mongo: &MongoService, notifier: &Notifier) -> AppResult<usize> {
    let now = DateTime::now();
    let tasks = mongo.overdue_tasks(now).await?;
    let mut flagged = 0;

    for task in tasks.iter().filter(|t| t.is_overdue(now)) {
        let Some(id) = task.id else { continue };

        // Flag first so a failing insert cannot make us nag every tick.
        if let Err(e) = mongo.mark_overdue_notified(&id).await {
            tracing::error!("Failed to flag task {} as overdue: {}", id, e);
            continue;
        }
        notifier.send(notifier::overdue_notices(task)).await;
        tracing::debug!("Task {} ({} {}) is overdue", id, task.course_code, task.doc_type);
        flagged += 1;
    }

    Ok(flagged)
}
