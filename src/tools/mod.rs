//! The interactive session: tool state machine, the live selection, and
//! the staging of queue operations.
//!
//! Input gathering and the simulation step run as separate phases, so the
//! whole session state sits behind one mutex; every public operation is a
//! single critical section and at most one queue operation is staged per
//! tick. Gesture timing (click vs. drag) belongs to the host; the session
//! only sees explicit begin/update/end calls.

use std::collections::HashSet;
use std::sync::Mutex;

use glam::Vec3;

use crate::history::{
    Action, ActionQueue, AlignHeightAction, BulldozeAction, CloneAction, SelectAction, Selection,
    TransformAction,
};
use crate::settings::Settings;
use crate::snap::{self, SegmentGuide, SnapRequest};
use crate::world::{EntityId, EntityState, World};

/// Keyboard nudge scale for the ground axes.
pub const NUDGE_FACTOR_XZ: f32 = 0.263671875;
/// Keyboard nudge scale for height.
pub const NUDGE_FACTOR_Y: f32 = 0.015625;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolState {
    Idle,
    /// Left/right drag moving or rotating the selection.
    Dragging,
    /// Marquee rectangle being drawn.
    DrawingSelection,
    /// Clone ghosts following the cursor, not yet committed.
    Cloning,
    /// Rotating the pending clone with the right button.
    RotatingClone,
    AligningHeights,
}

/// What the next simulation step should run. The session only ever holds
/// one, so an undo staged this tick can never interleave with a do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum PendingOp {
    #[default]
    None,
    Do,
    Undo,
    Redo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarqueeMode {
    /// Plain drag: the marquee becomes the selection.
    Replace,
    /// Shift: merge into the selection.
    Add,
    /// Alt: carve out of the selection.
    Subtract,
}

/// Runtime toggles mirroring the tool options panel.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub snapping: bool,
    pub follow_terrain: bool,
    pub use_cardinal_moves: bool,
    pub rmb_cancels_cloning: bool,
    /// Asset-editing host: the fixed world grid becomes a snap target.
    pub editor_grid: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            snapping: false,
            follow_terrain: true,
            use_cardinal_moves: false,
            rmb_cancels_cloning: false,
            editor_grid: false,
        }
    }
}

impl SessionOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            snapping: settings.tool.snapping,
            follow_terrain: settings.tool.follow_terrain,
            use_cardinal_moves: settings.tool.use_cardinal_moves,
            rmb_cancels_cloning: settings.tool.rmb_cancels_cloning,
            editor_grid: false,
        }
    }
}

struct SessionState {
    tool_state: ToolState,
    selection: Selection,
    queue: ActionQueue,
    pending: PendingOp,
    options: SessionOptions,
}

/// One editing session. All shared mutable state (the selection, the
/// queue and the current action's fields) lives behind this single lock.
pub struct Session {
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(options: SessionOptions, undo_limit: usize) -> Self {
        Self {
            state: Mutex::new(SessionState {
                tool_state: ToolState::Idle,
                selection: Selection::new(),
                queue: ActionQueue::with_limit(undo_limit),
                pending: PendingOp::None,
                options,
            }),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            SessionOptions::from_settings(settings),
            settings.tool.undo_limit,
        )
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn tool_state(&self) -> ToolState {
        self.lock().tool_state
    }

    pub fn options(&self) -> SessionOptions {
        self.lock().options
    }

    pub fn set_snapping(&self, on: bool) {
        self.lock().options.snapping = on;
    }

    pub fn set_follow_terrain(&self, on: bool) {
        self.lock().options.follow_terrain = on;
    }

    pub fn set_editor_grid(&self, on: bool) {
        self.lock().options.editor_grid = on;
    }

    pub fn selection(&self) -> Selection {
        self.lock().selection.clone()
    }

    pub fn selection_centroid(&self, world: &dyn World) -> Option<Vec3> {
        self.lock().selection.centroid(world)
    }

    /// The direction-snap guide of the current transform, for the host's
    /// preview overlay.
    pub fn current_guide(&self) -> Option<SegmentGuide> {
        match self.lock().queue.current() {
            Some(Action::Transform(action)) => action.guide,
            _ => None,
        }
    }

    // ---- selection gestures ----

    /// A click on `hit`. Plain click replaces the selection with the
    /// clicked entity; shift-click (`additive`) toggles its membership.
    pub fn click_select(&self, hit: EntityId, additive: bool) {
        if hit.is_none() {
            return;
        }
        let mut st = self.lock();
        if !matches!(
            st.tool_state,
            ToolState::Idle | ToolState::DrawingSelection
        ) {
            return;
        }
        fold_select_action(&mut st, additive);
        if additive {
            st.selection.toggle(hit);
        } else {
            st.selection.replace_with(hit);
        }
        record_select(&mut st);
        st.tool_state = ToolState::Idle;
    }

    /// Right-click on empty ground: drop the whole selection.
    pub fn clear_selection(&self) {
        let mut st = self.lock();
        if st.tool_state != ToolState::Idle || st.selection.is_empty() {
            return;
        }
        fold_select_action(&mut st, false);
        st.selection.clear();
        record_select(&mut st);
    }

    pub fn begin_marquee(&self) {
        let mut st = self.lock();
        if st.tool_state == ToolState::Idle {
            st.tool_state = ToolState::DrawingSelection;
        }
    }

    /// Finish a marquee gesture over `instances`. Gestures that cannot
    /// change membership (empty box, subtracting nothing that is selected,
    /// adding a subset) leave no history entry.
    pub fn marquee_apply(&self, instances: &HashSet<EntityId>, mode: MarqueeMode) {
        let mut st = self.lock();
        if st.tool_state == ToolState::DrawingSelection {
            st.tool_state = ToolState::Idle;
        }
        let no_op = match mode {
            MarqueeMode::Replace => instances.is_empty() && st.selection.is_empty(),
            MarqueeMode::Add => instances.is_empty() || st.selection.is_superset_of(instances),
            MarqueeMode::Subtract => instances.is_empty() || !st.selection.overlaps(instances),
        };
        if no_op {
            return;
        }
        fold_select_action(&mut st, mode == MarqueeMode::Add);
        match mode {
            MarqueeMode::Replace => {
                st.selection.clear();
                st.selection.union_with(instances);
            }
            MarqueeMode::Add => st.selection.union_with(instances),
            MarqueeMode::Subtract => st.selection.subtract(instances),
        }
        record_select(&mut st);
    }

    // ---- move/rotate ----

    /// Start a drag gesture. Reuses the current transform action when there
    /// is one (successive drags of the same selection accumulate into one
    /// undo step), otherwise captures fresh snapshots.
    pub fn begin_drag(&self, world: &dyn World) -> bool {
        let mut st = self.lock();
        if st.tool_state != ToolState::Idle || st.selection.is_empty() {
            return false;
        }
        if !matches!(st.queue.current_mut(), Some(Action::Transform(_))) {
            let Some(action) = TransformAction::new(&st.selection, world) else {
                return false;
            };
            st.queue.push(Action::Transform(action));
        }
        st.tool_state = ToolState::Dragging;
        true
    }

    /// Feed the drag's current raw deltas. Runs the snap engine when
    /// snapping is on, updates the current action in place and stages the
    /// apply. `ortho_rotate` locks the rotation to 45° steps.
    pub fn update_drag(
        &self,
        world: &dyn World,
        move_delta: Vec3,
        angle_delta: f32,
        ortho_rotate: bool,
    ) {
        let mut st = self.lock();
        if st.tool_state != ToolState::Dragging {
            return;
        }
        let angle_delta = if ortho_rotate {
            step_angle(angle_delta)
        } else {
            angle_delta
        };
        let options = st.options;
        let Some(Action::Transform(action)) = st.queue.current_mut() else {
            return;
        };

        let (delta, guide, auto_curve) = if options.snapping {
            let states = action.calculate_states(
                move_delta,
                angle_delta,
                action.center(),
                options.follow_terrain,
                world,
            );
            let result = snap::snap_delta(
                &SnapRequest {
                    states: &states,
                    move_delta,
                    angle_delta,
                    center: action.center(),
                    cloning: false,
                    editor_grid: options.editor_grid,
                },
                world,
            );
            (result.delta, result.guide, result.auto_curve)
        } else {
            (move_delta, None, false)
        };

        if action.move_delta != delta
            || action.angle_delta != angle_delta
            || action.guide != guide
        {
            action.move_delta = delta;
            action.angle_delta = angle_delta;
            action.follow_terrain = options.follow_terrain;
            action.guide = guide;
            action.auto_curve = auto_curve;
            st.pending = PendingOp::Do;
        }
    }

    pub fn end_drag(&self) {
        let mut st = self.lock();
        if st.tool_state == ToolState::Dragging {
            st.tool_state = ToolState::Idle;
        }
    }

    /// Keyboard nudge: axis steps scaled by the nudge factors, rotated to
    /// camera-relative axes unless cardinal moves are configured.
    pub fn nudge(&self, world: &dyn World, direction: Vec3, angle: f32, camera_yaw: f32) {
        let mut st = self.lock();
        match st.tool_state {
            ToolState::Cloning => {
                let Some(Action::Clone(action)) = st.queue.current_mut() else {
                    return;
                };
                action.move_delta.y += direction.y * NUDGE_FACTOR_Y;
                action.angle_delta += angle;
            }
            ToolState::Idle if !st.selection.is_empty() => {
                let options = st.options;
                if !matches!(st.queue.current_mut(), Some(Action::Transform(_))) {
                    let Some(action) = TransformAction::new(&st.selection, world) else {
                        return;
                    };
                    st.queue.push(Action::Transform(action));
                }
                let mut step = Vec3::new(
                    direction.x * NUDGE_FACTOR_XZ,
                    direction.y * NUDGE_FACTOR_Y,
                    direction.z * NUDGE_FACTOR_XZ,
                );
                if !options.use_cardinal_moves {
                    step = crate::util::geom::rotate_dir_xz(step, camera_yaw);
                }
                let Some(Action::Transform(action)) = st.queue.current_mut() else {
                    return;
                };
                action.move_delta += step;
                action.angle_delta += angle;
                action.follow_terrain = options.follow_terrain;
                st.pending = PendingOp::Do;
            }
            _ => {}
        }
    }

    // ---- cloning ----

    /// Lift a copy of the selection into a pending clone that follows the
    /// cursor until committed or cancelled.
    pub fn start_cloning(&self, world: &dyn World) -> bool {
        let mut st = self.lock();
        if st.tool_state == ToolState::AligningHeights {
            st.tool_state = ToolState::Idle;
        }
        if st.tool_state != ToolState::Idle || st.selection.is_empty() {
            return false;
        }
        let Some(action) = CloneAction::new(&st.selection, world) else {
            return false;
        };
        st.queue.push(Action::Clone(action));
        st.tool_state = ToolState::Cloning;
        true
    }

    /// Bring imported snapshot records in as a pending clone (the paste
    /// half of selection import).
    pub fn import_states(&self, states: Vec<EntityState>, center: Vec3) -> bool {
        let mut st = self.lock();
        if matches!(st.tool_state, ToolState::Cloning | ToolState::RotatingClone) {
            st.queue.invalidate();
        }
        st.tool_state = ToolState::Idle;
        let Some(action) = CloneAction::from_states(states, center, &st.selection) else {
            return false;
        };
        st.queue.push(Action::Clone(action));
        st.tool_state = ToolState::Cloning;
        true
    }

    /// Track the cursor with the pending clone. The clone's height offset
    /// is keyboard-driven and survives the planar update.
    pub fn update_clone(&self, world: &dyn World, move_delta: Vec3) {
        let mut st = self.lock();
        if st.tool_state != ToolState::Cloning {
            return;
        }
        let options = st.options;
        let Some(Action::Clone(action)) = st.queue.current_mut() else {
            return;
        };
        let mut delta = move_delta;
        delta.y = action.move_delta.y;
        if options.snapping {
            let states = action.calculate_states(
                delta,
                action.angle_delta,
                action.center,
                options.follow_terrain,
                world,
            );
            delta = snap::snap_delta(
                &SnapRequest {
                    states: &states,
                    move_delta: delta,
                    angle_delta: action.angle_delta,
                    center: action.center,
                    cloning: true,
                    editor_grid: options.editor_grid,
                },
                world,
            )
            .delta;
        }
        action.move_delta = delta;
    }

    pub fn begin_clone_rotation(&self) {
        let mut st = self.lock();
        if st.tool_state == ToolState::Cloning {
            st.tool_state = ToolState::RotatingClone;
        }
    }

    pub fn update_clone_rotation(&self, angle_delta: f32, ortho_rotate: bool) {
        let mut st = self.lock();
        if st.tool_state != ToolState::RotatingClone {
            return;
        }
        let Some(Action::Clone(action)) = st.queue.current_mut() else {
            return;
        };
        action.angle_delta = if ortho_rotate {
            step_angle(angle_delta)
        } else {
            angle_delta
        };
    }

    pub fn end_clone_rotation(&self) {
        let mut st = self.lock();
        if st.tool_state == ToolState::RotatingClone {
            st.tool_state = ToolState::Cloning;
        }
    }

    /// Right-click while cloning: a 45° clockwise step, unless configured
    /// to cancel instead.
    pub fn rotate_clone_step(&self) {
        let mut st = self.lock();
        if st.tool_state != ToolState::Cloning {
            return;
        }
        if st.options.rmb_cancels_cloning {
            drop(st);
            self.stop_cloning();
            return;
        }
        if let Some(Action::Clone(action)) = st.queue.current_mut() {
            action.angle_delta -= std::f32::consts::FRAC_PI_4;
        }
    }

    /// Stamp the pending clone into the world on the next simulation step.
    /// The step re-arms cloning with a fresh action so repeated stamps
    /// flow naturally.
    pub fn commit_clone(&self) {
        let mut st = self.lock();
        if st.tool_state != ToolState::Cloning {
            return;
        }
        let follow_terrain = st.options.follow_terrain;
        if let Some(Action::Clone(action)) = st.queue.current_mut() {
            action.follow_terrain = follow_terrain;
        }
        st.tool_state = ToolState::Idle;
        st.pending = PendingOp::Do;
    }

    /// Cancel the pending clone: the never-applied action is discarded and
    /// the queue reads as if it was never pushed.
    pub fn stop_cloning(&self) {
        let mut st = self.lock();
        if matches!(st.tool_state, ToolState::Cloning | ToolState::RotatingClone) {
            st.queue.invalidate();
            st.tool_state = ToolState::Idle;
        }
    }

    // ---- align heights ----

    pub fn start_align_heights(&self) -> bool {
        let mut st = self.lock();
        if matches!(st.tool_state, ToolState::Cloning | ToolState::RotatingClone) {
            st.queue.invalidate();
            st.tool_state = ToolState::Idle;
        }
        if st.tool_state != ToolState::Idle || st.selection.is_empty() {
            return false;
        }
        st.tool_state = ToolState::AligningHeights;
        true
    }

    pub fn stop_align_heights(&self) {
        let mut st = self.lock();
        if st.tool_state == ToolState::AligningHeights {
            st.tool_state = ToolState::Idle;
        }
    }

    /// Clicked a reference entity while aligning: level the selection to
    /// its height.
    pub fn align_to(&self, world: &dyn World, height: f32) {
        let mut st = self.lock();
        if st.tool_state != ToolState::AligningHeights {
            return;
        }
        st.tool_state = ToolState::Idle;
        let Some(action) = AlignHeightAction::new(&st.selection, world, height) else {
            return;
        };
        st.queue.push(Action::AlignHeight(action));
        st.pending = PendingOp::Do;
    }

    // ---- bulldoze ----

    pub fn bulldoze(&self, world: &dyn World) {
        let mut st = self.lock();
        if st.tool_state != ToolState::Idle || st.selection.is_empty() {
            return;
        }
        let Some(action) = BulldozeAction::new(&st.selection, world) else {
            return;
        };
        st.queue.push(Action::Bulldoze(action));
        st.pending = PendingOp::Do;
    }

    // ---- history ----

    pub fn request_undo(&self) {
        let mut st = self.lock();
        if st.tool_state == ToolState::Idle {
            st.pending = PendingOp::Undo;
        }
    }

    pub fn request_redo(&self) {
        let mut st = self.lock();
        if st.tool_state == ToolState::Idle {
            st.pending = PendingOp::Redo;
        }
    }

    pub fn can_undo(&self) -> bool {
        self.lock().queue.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.lock().queue.can_redo()
    }

    /// Run the staged operation against the world. Called once per
    /// simulation tick; a committed clone immediately re-arms a fresh
    /// pending clone of the newly created entities.
    pub fn simulation_step(&self, world: &mut dyn World) {
        let mut st = self.lock();
        let pending = std::mem::take(&mut st.pending);
        let st = &mut *st;
        match pending {
            PendingOp::None => {}
            PendingOp::Do => {
                st.queue.do_step(world, &mut st.selection);
                if st.tool_state == ToolState::Idle
                    && matches!(st.queue.current(), Some(Action::Clone(_)))
                    && let Some(action) = CloneAction::new(&st.selection, &*world)
                {
                    st.queue.push(Action::Clone(action));
                    st.tool_state = ToolState::Cloning;
                }
            }
            PendingOp::Undo => st.queue.undo(world, &mut st.selection),
            PendingOp::Redo => st.queue.redo(world, &mut st.selection),
        }
    }

    /// Tool switched away: cancel whatever preview is in flight. History
    /// survives tool toggles.
    pub fn deactivate(&self) {
        let mut st = self.lock();
        if matches!(st.tool_state, ToolState::Cloning | ToolState::RotatingClone) {
            st.queue.invalidate();
        }
        st.tool_state = ToolState::Idle;
        st.pending = PendingOp::None;
    }
}

/// Lock an angle to the nearest multiple of 45°.
pub fn step_angle(angle: f32) -> f32 {
    let quarter = std::f32::consts::FRAC_PI_4;
    (angle / quarter).round() * quarter
}

/// Reuse the current select action while it is still open, otherwise open
/// a new one capturing the membership before this gesture.
fn fold_select_action(st: &mut SessionState, additive: bool) {
    if matches!(st.queue.current_mut(), Some(Action::Select(_))) {
        return;
    }
    let action = SelectAction::new(&st.selection, additive);
    st.queue.push(Action::Select(action));
}

fn record_select(st: &mut SessionState) {
    let selection = st.selection.clone();
    if let Some(Action::Select(action)) = st.queue.current_mut() {
        action.record(&selection);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{ArenaWorld, World};

    fn world_with_props(n: u32) -> (ArenaWorld, Vec<EntityId>) {
        let mut world = ArenaWorld::new();
        let ids = (0..n)
            .map(|i| EntityId::prop(world.add_prop(Vec3::new(i as f32 * 10.0, 0.0, 0.0), 0.0)))
            .collect();
        (world, ids)
    }

    #[test]
    fn plain_click_replaces_shift_click_toggles() {
        let (_world, ids) = world_with_props(3);
        let session = Session::new(SessionOptions::default(), 100);

        session.click_select(ids[0], false);
        assert_eq!(session.selection().len(), 1);
        assert!(session.selection().contains(ids[0]));

        session.click_select(ids[1], false);
        let selection = session.selection();
        assert_eq!(selection.len(), 1);
        assert!(selection.contains(ids[1]));

        session.click_select(ids[0], true);
        assert_eq!(session.selection().len(), 2);
        session.click_select(ids[0], true);
        let selection = session.selection();
        assert_eq!(selection.len(), 1);
        assert!(!selection.contains(ids[0]));
    }

    #[test]
    fn marquee_modes() {
        let (_world, ids) = world_with_props(4);
        let session = Session::new(SessionOptions::default(), 100);

        let first_two: HashSet<EntityId> = ids[..2].iter().copied().collect();
        let last_two: HashSet<EntityId> = ids[2..].iter().copied().collect();

        session.begin_marquee();
        session.marquee_apply(&first_two, MarqueeMode::Replace);
        assert_eq!(session.selection().len(), 2);

        session.begin_marquee();
        session.marquee_apply(&last_two, MarqueeMode::Add);
        assert_eq!(session.selection().len(), 4);

        session.begin_marquee();
        session.marquee_apply(&first_two, MarqueeMode::Subtract);
        let selection = session.selection();
        assert_eq!(selection.len(), 2);
        assert!(selection.contains(ids[2]) && selection.contains(ids[3]));
    }

    #[test]
    fn noop_marquee_leaves_no_history() {
        let (_world, ids) = world_with_props(2);
        let session = Session::new(SessionOptions::default(), 100);
        let empty: HashSet<EntityId> = HashSet::new();
        session.marquee_apply(&empty, MarqueeMode::Replace);
        assert!(!session.can_undo());

        // Subtracting entities that are not selected changes nothing.
        let others: HashSet<EntityId> = ids.iter().copied().collect();
        session.marquee_apply(&others, MarqueeMode::Subtract);
        assert!(!session.can_undo());
    }

    #[test]
    fn drag_moves_selection_on_simulation_step() {
        let (mut world, ids) = world_with_props(2);
        let session = Session::new(SessionOptions::default(), 100);
        session.click_select(ids[0], false);
        session.click_select(ids[1], true);

        assert!(session.begin_drag(&world));
        session.update_drag(&world, Vec3::new(5.0, 0.0, 0.0), 0.0, false);
        session.simulation_step(&mut world);
        session.end_drag();

        assert_eq!(
            world.entity_state(ids[0]).unwrap().position,
            Vec3::new(5.0, 0.0, 0.0)
        );
        assert_eq!(
            world.entity_state(ids[1]).unwrap().position,
            Vec3::new(15.0, 0.0, 0.0)
        );

        session.request_undo();
        session.simulation_step(&mut world);
        assert_eq!(
            world.entity_state(ids[0]).unwrap().position,
            Vec3::ZERO
        );
    }

    #[test]
    fn undo_not_staged_while_dragging() {
        let (mut world, ids) = world_with_props(1);
        let session = Session::new(SessionOptions::default(), 100);
        session.click_select(ids[0], false);
        session.begin_drag(&world);
        session.update_drag(&world, Vec3::new(5.0, 0.0, 0.0), 0.0, false);
        // The drag's Do is staged; an undo request mid-gesture is refused,
        // so the staged Do still runs.
        session.request_undo();
        session.simulation_step(&mut world);
        assert_eq!(
            world.entity_state(ids[0]).unwrap().position,
            Vec3::new(5.0, 0.0, 0.0)
        );
    }

    #[test]
    fn ortho_rotation_locks_to_45_degrees() {
        assert!((step_angle(0.7) - std::f32::consts::FRAC_PI_4).abs() < 1e-6);
        assert!((step_angle(1.6) - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert_eq!(step_angle(0.0), 0.0);
    }

    #[test]
    fn clone_commit_rearms_cloning() {
        let (mut world, ids) = world_with_props(1);
        let session = Session::new(SessionOptions::default(), 100);
        session.click_select(ids[0], false);

        assert!(session.start_cloning(&world));
        session.update_clone(&world, Vec3::new(0.0, 0.0, 12.0));
        session.commit_clone();
        session.simulation_step(&mut world);

        // The stamp landed and a fresh pending clone follows the cursor.
        assert_eq!(session.tool_state(), ToolState::Cloning);
        assert!(
            world
                .entity_state(EntityId::prop(2))
                .is_some_and(|s| s.position == Vec3::new(0.0, 0.0, 12.0))
        );

        // Cancelling the re-armed clone leaves only the committed one.
        session.stop_cloning();
        assert_eq!(session.tool_state(), ToolState::Idle);
        session.request_undo();
        session.simulation_step(&mut world);
        assert!(world.entity_state(EntityId::prop(2)).is_none());
        assert!(session.selection().contains(ids[0]));
    }

    #[test]
    fn cancelled_clone_leaves_queue_unchanged() {
        let (mut world, ids) = world_with_props(1);
        let session = Session::new(SessionOptions::default(), 100);
        session.click_select(ids[0], false);

        session.start_cloning(&world);
        session.update_clone(&world, Vec3::new(0.0, 0.0, 12.0));
        session.stop_cloning();

        assert_eq!(session.tool_state(), ToolState::Idle);
        session.simulation_step(&mut world);
        assert!(world.entity_state(EntityId::prop(2)).is_none());
        // Only the select gesture remains undoable.
        session.request_undo();
        session.simulation_step(&mut world);
        assert!(session.selection().is_empty());
        assert!(!session.can_undo());
    }

    #[test]
    fn align_heights_levels_selection() {
        let mut world = ArenaWorld::new();
        let a = EntityId::prop(world.add_prop(Vec3::new(0.0, 1.0, 0.0), 0.0));
        let b = EntityId::prop(world.add_prop(Vec3::new(10.0, 4.0, 0.0), 0.0));
        let session = Session::new(SessionOptions::default(), 100);
        session.click_select(a, false);
        session.click_select(b, true);

        assert!(session.start_align_heights());
        session.align_to(&world, 2.5);
        session.simulation_step(&mut world);

        assert_eq!(world.entity_state(a).unwrap().position.y, 2.5);
        assert_eq!(world.entity_state(b).unwrap().position.y, 2.5);

        session.request_undo();
        session.simulation_step(&mut world);
        assert_eq!(world.entity_state(a).unwrap().position.y, 1.0);
        assert_eq!(world.entity_state(b).unwrap().position.y, 4.0);
    }

    #[test]
    fn bulldoze_requires_idle_and_selection() {
        let (mut world, ids) = world_with_props(1);
        let session = Session::new(SessionOptions::default(), 100);
        session.bulldoze(&world);
        session.simulation_step(&mut world);
        assert!(world.entity_state(ids[0]).is_some());

        session.click_select(ids[0], false);
        session.bulldoze(&world);
        session.simulation_step(&mut world);
        assert!(world.entity_state(ids[0]).is_none());
        assert!(session.selection().is_empty());
    }

    #[test]
    fn snapping_drag_picks_up_guides() {
        let mut world = ArenaWorld::new();
        let n = world.add_node(Vec3::ZERO);
        let a = world.add_node(Vec3::new(32.0, 0.0, 0.0));
        let b = world.add_node(Vec3::new(64.0, 0.0, 0.0));
        world.add_segment(n, a);
        world.add_segment(a, b);

        let session = Session::new(
            SessionOptions {
                snapping: true,
                ..SessionOptions::default()
            },
            100,
        );
        session.click_select(EntityId::node(n), false);
        session.begin_drag(&world);
        session.update_drag(&world, Vec3::new(-5.0, 0.0, 3.0), 0.0, false);
        session.simulation_step(&mut world);

        // Snapped onto the neighbor's tangent line (z = 0).
        let moved = world.entity_state(EntityId::node(n)).unwrap().position;
        assert!((moved - Vec3::new(-5.0, 0.0, 0.0)).length() < 1e-4);
        let guide = session.current_guide().expect("tangent guide");
        assert_eq!(guide.start_node, n);
        assert_eq!(guide.end_node, a);
    }
}
