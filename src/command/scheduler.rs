// Sequential command scheduler
//
// Runs an ordered list of commands one at a time. Each cycle ticks the
// hardware's auxiliary subsystems, then the active command; a finished
// command is stopped and the next one started in the same cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::Command;
use crate::config::{LOOP_HZ, loop_period};
use crate::motor::Hardware;

/// Cross-thread request to end a scheduler run early
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a `run` ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Pending,
    Active,
    Stopped,
}

struct Slot {
    command: Box<dyn Command>,
    state: SlotState,
}

impl Slot {
    fn start(&mut self, index: usize, hw: &mut dyn Hardware) {
        // A command is started at most once
        if self.state != SlotState::Pending {
            return;
        }
        info!("Starting command {} ({})", index, self.command.name());
        self.state = SlotState::Active;
        self.command.start(hw);
    }

    fn stop(&mut self, index: usize, hw: &mut dyn Hardware) {
        if self.state == SlotState::Stopped {
            return;
        }
        debug!("Stopping command {} ({})", index, self.command.name());
        self.state = SlotState::Stopped;
        self.command.stop(hw);
    }
}

/// Executes commands in order, one active command at a time.
///
/// Every command is started at most once and stopped exactly once, on
/// natural completion or on abort. A finished scheduler does not restart.
pub struct Scheduler {
    slots: Vec<Slot>,
    current_index: usize,
    running: bool,
    tick_period: Duration,
    abort: AbortHandle,
}

impl Scheduler {
    pub fn new(commands: Vec<Box<dyn Command>>) -> Self {
        Self {
            slots: commands
                .into_iter()
                .map(|command| Slot {
                    command,
                    state: SlotState::Pending,
                })
                .collect(),
            current_index: 0,
            running: false,
            tick_period: loop_period(LOOP_HZ),
            abort: AbortHandle::default(),
        }
    }

    /// Set the control cycle period used by `run`
    pub fn with_tick_period(mut self, tick_period: Duration) -> Self {
        self.tick_period = tick_period;
        self
    }

    /// Set the control cycle rate used by `run`
    pub fn with_loop_hz(self, hz: u64) -> Self {
        self.with_tick_period(loop_period(hz))
    }

    /// Append a command to the end of the sequence
    pub fn push(&mut self, command: Box<dyn Command>) {
        self.slots.push(Slot {
            command,
            state: SlotState::Pending,
        });
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_finished(&self) -> bool {
        !self.running
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Start the command at the cursor. An empty or exhausted sequence
    /// finishes immediately.
    pub fn start(&mut self, hw: &mut dyn Hardware) {
        let index = self.current_index;
        let len = self.slots.len();
        let Some(slot) = self.slots.get_mut(index) else {
            info!("No commands to run");
            self.running = false;
            return;
        };
        // A stopped sequence stays stopped
        if slot.state != SlotState::Pending {
            info!("Command {} already ran, not restarting", index);
            self.running = false;
            return;
        }
        info!("Starting scheduler with {} commands", len);
        self.running = true;
        slot.start(index, hw);
    }

    /// Run one control cycle. Returns false once the sequence is exhausted.
    pub fn tick(&mut self, hw: &mut dyn Hardware) -> bool {
        if !self.running {
            return false;
        }
        let index = self.current_index;
        let Some(slot) = self.slots.get_mut(index) else {
            self.running = false;
            return false;
        };
        if slot.state != SlotState::Active {
            self.running = false;
            return false;
        }

        hw.tick();
        slot.command.tick(hw);

        if slot.command.is_finished() {
            slot.stop(index, hw);
            self.current_index += 1;

            let next = self.current_index;
            match self.slots.get_mut(next) {
                Some(slot) => slot.start(next, hw),
                None => {
                    self.running = false;
                    return false;
                }
            }
        }

        true
    }

    /// Abort path: stop every command that has not been stopped yet,
    /// including commands that were never started.
    pub fn stop(&mut self, hw: &mut dyn Hardware) {
        self.running = false;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            slot.stop(index, hw);
        }
    }

    /// Start, tick at the configured rate until done or aborted, then stop.
    ///
    /// Blocks the calling thread for the whole sequence.
    pub fn run(&mut self, hw: &mut dyn Hardware) -> RunOutcome {
        self.start(hw);

        let mut outcome = RunOutcome::Completed;
        let mut next_cycle = Instant::now();

        while self.running {
            if self.abort.is_aborted() {
                warn!("Scheduler aborted at command {}", self.current_index);
                outcome = RunOutcome::Aborted;
                break;
            }

            if !self.tick(hw) {
                break;
            }

            next_cycle += self.tick_period;
            let now = Instant::now();
            if next_cycle > now {
                std::thread::sleep(next_cycle - now);
            } else {
                // Overran the cycle; don't try to catch up
                next_cycle = now;
            }
        }

        self.stop(hw);
        match outcome {
            RunOutcome::Completed => info!("Scheduler finished all commands"),
            RunOutcome::Aborted => info!("Scheduler stopped all commands after abort"),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::{Event, Scripted, RecordingHardware};
    use crate::command::{DriveForDuration, Stop};
    use crate::messages::DriveSignal;
    use crate::motor::WireCommand;
    use std::sync::Mutex;

    fn log() -> Arc<Mutex<Vec<Event>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn events(log: &Arc<Mutex<Vec<Event>>>) -> Vec<Event> {
        log.lock().unwrap().clone()
    }

    fn count(events: &[Event], wanted: &Event) -> usize {
        events.iter().filter(|e| *e == wanted).count()
    }

    #[test]
    fn test_empty_sequence_finishes_immediately() {
        let mut hw = RecordingHardware::default();
        let mut scheduler = Scheduler::new(Vec::new());
        scheduler.start(&mut hw);
        assert!(scheduler.is_finished());
        assert!(!scheduler.tick(&mut hw));
        assert_eq!(scheduler.run(&mut hw), RunOutcome::Completed);
        assert!(hw.frames.is_empty());
    }

    #[test]
    fn test_lifecycle_order() {
        let log = log();
        let mut hw = RecordingHardware::default();
        let mut scheduler = Scheduler::new(vec![
            Scripted::new(0, 1, &log),
            Scripted::new(1, 3, &log),
            Scripted::new(2, 1, &log),
        ]);

        scheduler.start(&mut hw);
        let mut cycles = 0;
        while scheduler.tick(&mut hw) {
            cycles += 1;
        }
        scheduler.stop(&mut hw);

        use Event as E;
        assert_eq!(
            events(&log),
            vec![
                E::Start(0),
                E::Tick(0),
                E::Stop(0),
                E::Start(1),
                E::Tick(1),
                E::Tick(1),
                E::Tick(1),
                E::Stop(1),
                E::Start(2),
                E::Tick(2),
                E::Stop(2),
            ]
        );
        // The last tick returns false
        assert_eq!(cycles, 4);
        assert_eq!(scheduler.current_index(), 3);
        assert!(scheduler.is_finished());
    }

    #[test]
    fn test_start_and_stop_exactly_once() {
        let log = log();
        let mut hw = RecordingHardware::default();
        let commands: Vec<Box<dyn Command>> = (0..5)
            .map(|i| -> Box<dyn Command> { Scripted::new(i, i, &log) })
            .collect();
        let mut scheduler = Scheduler::new(commands).with_tick_period(Duration::ZERO);

        assert_eq!(scheduler.run(&mut hw), RunOutcome::Completed);

        let events = events(&log);
        for i in 0..5 {
            assert_eq!(count(&events, &Event::Start(i)), 1, "start {}", i);
            assert_eq!(count(&events, &Event::Stop(i)), 1, "stop {}", i);
        }
    }

    #[test]
    fn test_every_command_ticked_at_least_once() {
        let log = log();
        let mut hw = RecordingHardware::default();
        let mut scheduler =
            Scheduler::new(vec![Scripted::new(0, 0, &log), Scripted::new(1, 0, &log)])
                .with_tick_period(Duration::ZERO);
        scheduler.run(&mut hw);

        let events = events(&log);
        assert_eq!(count(&events, &Event::Tick(0)), 1);
        assert_eq!(count(&events, &Event::Tick(1)), 1);
    }

    #[test]
    fn test_hardware_ticked_once_per_cycle() {
        let log = log();
        let mut hw = RecordingHardware::default();
        let mut scheduler =
            Scheduler::new(vec![Scripted::new(0, 2, &log), Scripted::new(1, 3, &log)])
                .with_tick_period(Duration::ZERO);
        scheduler.run(&mut hw);
        assert_eq!(hw.ticks, 5);
    }

    #[test]
    fn test_stop_mid_sequence_stops_all_once() {
        let log = log();
        let mut hw = RecordingHardware::default();
        let mut scheduler = Scheduler::new(vec![
            Scripted::new(0, 1, &log),
            Scripted::new(1, 10, &log),
            Scripted::new(2, 1, &log),
        ]);

        scheduler.start(&mut hw);
        scheduler.tick(&mut hw); // finishes 0, starts 1
        scheduler.tick(&mut hw);
        scheduler.stop(&mut hw);

        let events = events(&log);
        assert!(!scheduler.is_running());
        for i in 0..3 {
            assert_eq!(count(&events, &Event::Stop(i)), 1, "stop {}", i);
        }
        // Never-started command is stopped but not started
        assert_eq!(count(&events, &Event::Start(2)), 0);
    }

    #[test]
    fn test_stopped_scheduler_does_not_restart_commands() {
        let log = log();
        let mut hw = RecordingHardware::default();
        let mut scheduler = Scheduler::new(vec![Scripted::new(0, 5, &log)]);
        scheduler.start(&mut hw);
        scheduler.stop(&mut hw);
        scheduler.start(&mut hw);
        assert!(!scheduler.is_running());
        assert!(!scheduler.tick(&mut hw));

        let events = events(&log);
        assert_eq!(count(&events, &Event::Start(0)), 1);
        assert_eq!(count(&events, &Event::Stop(0)), 1);
        assert_eq!(count(&events, &Event::Tick(0)), 0);
    }

    #[test]
    fn test_stopped_drive_does_not_move_again() {
        let mut hw = RecordingHardware::default();
        let mut scheduler = Scheduler::new(vec![Box::new(DriveForDuration::new(
            DriveSignal::new(0.0, 1.0, 0.0),
            Duration::from_secs(60),
        ))]);
        assert!(!scheduler.is_empty());

        scheduler.start(&mut hw);
        scheduler.stop(&mut hw);
        scheduler.start(&mut hw);
        assert!(!scheduler.tick(&mut hw));

        assert_eq!(
            hw.frames,
            vec![WireCommand::new(992, 1792, 992), WireCommand::neutral()]
        );
        assert_eq!(hw.last_frame(), Some(WireCommand::neutral()));
    }

    #[test]
    fn test_push_while_running() {
        let log = log();
        let mut hw = RecordingHardware::default();
        let mut scheduler = Scheduler::new(vec![Scripted::new(0, 2, &log)]);
        scheduler.start(&mut hw);
        assert!(scheduler.tick(&mut hw));
        scheduler.push(Scripted::new(1, 1, &log));
        while scheduler.tick(&mut hw) {}

        let events = events(&log);
        assert_eq!(count(&events, &Event::Start(1)), 1);
        assert_eq!(count(&events, &Event::Stop(1)), 1);
        assert_eq!(scheduler.len(), 2);
    }

    #[test]
    fn test_abort_before_first_tick() {
        let log = log();
        let mut hw = RecordingHardware::default();
        let mut scheduler =
            Scheduler::new(vec![Scripted::new(0, 1, &log), Scripted::new(1, 1, &log)]);
        scheduler.abort_handle().abort();

        assert_eq!(scheduler.run(&mut hw), RunOutcome::Aborted);
        use Event as E;
        assert_eq!(events(&log), vec![E::Start(0), E::Stop(0), E::Stop(1)]);
    }

    #[test]
    fn test_abort_from_another_thread_leaves_neutral() {
        let mut hw = RecordingHardware::default();
        let mut scheduler = Scheduler::new(vec![
            Box::new(DriveForDuration::new(
                DriveSignal::new(0.0, 1.0, 0.0),
                Duration::from_secs(60),
            )),
            Box::new(Stop),
        ])
        .with_tick_period(Duration::from_millis(2));

        let handle = scheduler.abort_handle();
        let aborter = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            handle.abort();
        });

        assert_eq!(scheduler.run(&mut hw), RunOutcome::Aborted);
        aborter.join().unwrap();
        assert_eq!(hw.last_frame(), Some(WireCommand::neutral()));
    }

    #[test]
    fn test_drive_then_stop_scenario() {
        let duration = Duration::from_millis(40);
        let mut hw = RecordingHardware::default();
        let mut scheduler = Scheduler::new(vec![
            Box::new(DriveForDuration::new(DriveSignal::new(0.0, 0.4, 0.0), duration)),
            Box::new(Stop),
        ])
        .with_tick_period(Duration::from_millis(5));

        assert_eq!(scheduler.run(&mut hw), RunOutcome::Completed);

        let drive = WireCommand::new(992, 1312, 992);
        let neutral = WireCommand::neutral();
        assert_eq!(hw.frames.first(), Some(&drive));
        assert_eq!(hw.last_frame(), Some(neutral));

        // Drive's stop frame comes before Stop's start frame, and nothing drives after it
        let first_neutral = hw.frames.iter().position(|f| *f == neutral).unwrap();
        assert!(hw.frames[..first_neutral].iter().all(|f| *f == drive));
        assert_eq!(&hw.frames[first_neutral..], &[neutral, neutral]);

        // Drive held for at least its duration
        let held = hw.sent_at[first_neutral].duration_since(hw.sent_at[0]);
        assert!(held >= duration, "held {:?}", held);
    }

    #[test]
    fn test_loop_hz_sets_period() {
        let scheduler = Scheduler::new(Vec::new()).with_loop_hz(50);
        assert_eq!(scheduler.tick_period(), Duration::from_millis(20));
    }
}
