use crate::{CollectorState, Effect, Msg, Termination};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: CollectorState, msg: Msg) -> (CollectorState, Vec<Effect>) {
    let effects = match msg {
        Msg::StartRequested { target, username } => {
            if state.is_running() {
                // A second start never touches the running job.
                return (state, Vec::new());
            }
            let run = state.begin_run(target, username);
            vec![
                Effect::DiscardPending,
                Effect::PublishStatus,
                Effect::RunTick {
                    run,
                    auto_scroll: state.run_auto_scroll(),
                },
            ]
        }
        Msg::StopRequested => {
            if state.is_running() && !state.stop_requested() {
                state.request_stop();
                vec![Effect::PublishStatus]
            } else {
                Vec::new()
            }
        }
        Msg::TickCompleted { run, batch } => {
            if !state.is_current_run(run) {
                return (state, Vec::new());
            }
            state.record_tick(batch.items, batch.mode);
            let mut effects = vec![Effect::PublishStatus];
            if batch.end_of_page {
                effects.extend(finish(&mut state, Termination::Finished));
            } else if state.stop_requested() {
                effects.extend(finish(&mut state, Termination::StoppedByUser));
            } else {
                effects.push(Effect::ScheduleTick { run });
            }
            effects
        }
        Msg::TickFailed { run, reason } => {
            if !state.is_current_run(run) {
                return (state, Vec::new());
            }
            finish(&mut state, Termination::Failed(reason))
        }
        Msg::TickDue { run } => {
            if !state.is_current_run(run) {
                return (state, Vec::new());
            }
            if state.stop_requested() {
                finish(&mut state, Termination::StoppedByUser)
            } else {
                vec![Effect::RunTick {
                    run,
                    auto_scroll: state.run_auto_scroll(),
                }]
            }
        }
        Msg::SettingsUpdated(settings) => {
            // Applies from the next run; a running job keeps its tick options.
            state.set_settings(settings);
            Vec::new()
        }
        Msg::CommitFailed { reason } => {
            state.set_message(format!("Could not save to history: {reason}"));
            vec![Effect::PublishStatus]
        }
    };

    (state, effects)
}

fn finish(state: &mut CollectorState, cause: Termination) -> Vec<Effect> {
    let (cause, job) = state.end_run(cause);
    let mut effects = Vec::with_capacity(4);
    if let Some(job) = job {
        match cause {
            Termination::Finished => {
                effects.push(Effect::CommitJob(job.clone()));
                effects.push(Effect::StashPending(job));
            }
            Termination::StoppedByUser | Termination::Failed(_) => {
                effects.push(Effect::StashPending(job));
            }
        }
    }
    effects.push(Effect::ReleaseSurface);
    effects.push(Effect::PublishStatus);
    effects
}
