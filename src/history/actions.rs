use std::collections::{HashMap, HashSet};

use glam::Vec3;

use crate::snap::SegmentGuide;
use crate::util::geom;
use crate::world::{EntityId, EntityKind, EntityState, StateExtra, World, WorldError};

/// The live set of selected entities. One per session, only ever touched
/// inside the session's critical section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    items: HashSet<EntityId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.items.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.items.iter().copied()
    }

    /// Ids in a stable order, for deterministic iteration over targets.
    pub fn sorted(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.items.iter().copied().collect();
        ids.sort();
        ids
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// The index-0 sentinel is never a member.
    pub fn add(&mut self, id: EntityId) -> bool {
        if id.is_none() {
            return false;
        }
        self.items.insert(id)
    }

    pub fn remove(&mut self, id: EntityId) -> bool {
        self.items.remove(&id)
    }

    pub fn toggle(&mut self, id: EntityId) {
        if !self.items.remove(&id) {
            self.add(id);
        }
    }

    pub fn replace_with(&mut self, id: EntityId) {
        self.items.clear();
        self.add(id);
    }

    pub fn union_with(&mut self, ids: &HashSet<EntityId>) {
        for &id in ids {
            self.add(id);
        }
    }

    pub fn subtract(&mut self, ids: &HashSet<EntityId>) {
        for id in ids {
            self.items.remove(id);
        }
    }

    pub fn overlaps(&self, ids: &HashSet<EntityId>) -> bool {
        ids.iter().any(|id| self.items.contains(id))
    }

    pub fn is_superset_of(&self, ids: &HashSet<EntityId>) -> bool {
        ids.iter().all(|id| self.items.contains(id))
    }

    pub fn as_set(&self) -> &HashSet<EntityId> {
        &self.items
    }

    pub fn set(&mut self, items: HashSet<EntityId>) {
        self.items = items;
    }

    /// Centroid of the members' current positions, for the selection marker.
    pub fn centroid(&self, world: &dyn World) -> Option<Vec3> {
        let mut sum = Vec3::ZERO;
        let mut count = 0u32;
        for id in &self.items {
            if let Some(state) = world.entity_state(*id) {
                sum += state.position;
                count += 1;
            }
        }
        (count > 0).then(|| sum / count as f32)
    }
}

impl FromIterator<EntityId> for Selection {
    fn from_iter<T: IntoIterator<Item = EntityId>>(iter: T) -> Self {
        let mut selection = Selection::new();
        for id in iter {
            selection.add(id);
        }
        selection
    }
}

/// Map one captured state to its prospective state under a move/rotate
/// delta about `center`. Pure; the world is only consulted for terrain
/// samples when `follow_terrain` re-bases heights.
fn transformed_state(
    state: &EntityState,
    move_delta: Vec3,
    angle_delta: f32,
    center: Vec3,
    follow_terrain: bool,
    world: &dyn World,
) -> EntityState {
    let place = |position: Vec3| -> Vec3 {
        let mut out = geom::rotate_xz(position, center, angle_delta);
        out.x += move_delta.x;
        out.z += move_delta.z;
        out.y = position.y + move_delta.y;
        if follow_terrain {
            out.y += world.terrain_height(out.x, out.z) - world.terrain_height(position.x, position.z);
        }
        out
    };

    let position = place(state.position);
    let extra = match &state.extra {
        StateExtra::Building {
            length,
            width,
            sub_nodes,
        } => StateExtra::Building {
            length: *length,
            width: *width,
            sub_nodes: sub_nodes.iter().map(|(n, p)| (*n, place(*p))).collect(),
        },
        StateExtra::Segment {
            start_node,
            end_node,
            start_pos,
            end_pos,
            start_dir,
            end_dir,
        } => StateExtra::Segment {
            start_node: *start_node,
            end_node: *end_node,
            start_pos: place(*start_pos),
            end_pos: place(*end_pos),
            start_dir: geom::rotate_dir_xz(*start_dir, angle_delta),
            end_dir: geom::rotate_dir_xz(*end_dir, angle_delta),
        },
        other => other.clone(),
    };

    EntityState::new(state.id, position, state.angle + angle_delta, extra)
}

/// Write one state into the world. Buildings carry their sub-network nodes;
/// segments are placed by moving their endpoint nodes.
fn write_state(world: &mut dyn World, state: &EntityState) -> Result<(), WorldError> {
    match &state.extra {
        StateExtra::Building { sub_nodes, .. } => {
            world.set_transform(state.id, state.position, state.angle)?;
            for (node, position) in sub_nodes {
                world.set_transform(EntityId::node(*node), *position, 0.0)?;
            }
            Ok(())
        }
        StateExtra::Segment {
            start_node,
            end_node,
            start_pos,
            end_pos,
            ..
        } => {
            world.set_transform(EntityId::node(*start_node), *start_pos, 0.0)?;
            world.set_transform(EntityId::node(*end_node), *end_pos, 0.0)
        }
        _ => world.set_transform(state.id, state.position, state.angle),
    }
}

/// Capture snapshots for a set of ids, in stable id order, dropping dead
/// handles. Returns the states and the centroid of their positions.
fn capture(ids: &[EntityId], world: &dyn World) -> (Vec<EntityState>, Vec3) {
    let states: Vec<EntityState> = ids
        .iter()
        .filter_map(|id| world.entity_state(*id))
        .collect();
    let center = centroid_of(&states).unwrap_or(Vec3::ZERO);
    (states, center)
}

fn centroid_of(states: &[EntityState]) -> Option<Vec3> {
    if states.is_empty() {
        return None;
    }
    Some(states.iter().map(|s| s.position).sum::<Vec3>() / states.len() as f32)
}

/// Records a selection membership change so it can be walked back.
#[derive(Debug, Clone)]
pub struct SelectAction {
    before: HashSet<EntityId>,
    after: HashSet<EntityId>,
    /// Shift-gesture merge rather than replace; kept for tooling/UI.
    pub additive: bool,
}

impl SelectAction {
    pub fn new(selection: &Selection, additive: bool) -> Self {
        Self {
            before: selection.as_set().clone(),
            after: selection.as_set().clone(),
            additive,
        }
    }

    /// Update the recorded outcome after the live selection was edited.
    /// Only valid while this action is still current.
    pub fn record(&mut self, selection: &Selection) {
        self.after = selection.as_set().clone();
    }

    fn apply(&self, selection: &mut Selection) {
        selection.set(self.after.clone());
    }

    fn unapply(&self, selection: &mut Selection) {
        selection.set(self.before.clone());
    }
}

/// Move/rotate of the selection. Targets and their snapshots are fixed at
/// creation; the deltas accumulate across the gesture and every apply
/// recomputes from the snapshots, so re-applying is exact and undo is a
/// verbatim restore.
#[derive(Debug, Clone)]
pub struct TransformAction {
    states: Vec<EntityState>,
    center: Vec3,
    pub move_delta: Vec3,
    pub angle_delta: f32,
    pub follow_terrain: bool,
    /// Synthesized curve produced by direction snap, for preview and for
    /// committing the segment's new shape.
    pub guide: Option<SegmentGuide>,
    /// The guide is a curve fit the moved segment should adopt, not just a
    /// tangent line.
    pub auto_curve: bool,
    /// Segment tangents replaced when a guide was committed, kept so a
    /// recompute or undo can put them back.
    reshaped: Vec<(u32, Vec3, Vec3)>,
}

impl TransformAction {
    pub fn new(selection: &Selection, world: &dyn World) -> Option<Self> {
        let (states, center) = capture(&selection.sorted(), world);
        if states.is_empty() {
            return None;
        }
        Some(Self {
            states,
            center,
            move_delta: Vec3::ZERO,
            angle_delta: 0.0,
            follow_terrain: true,
            guide: None,
            auto_curve: false,
            reshaped: Vec::new(),
        })
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn states(&self) -> &[EntityState] {
        &self.states
    }

    /// Prospective states under a candidate delta; feeds the snap engine
    /// without touching the world.
    pub fn calculate_states(
        &self,
        move_delta: Vec3,
        angle_delta: f32,
        center: Vec3,
        follow_terrain: bool,
        world: &dyn World,
    ) -> Vec<EntityState> {
        self.states
            .iter()
            .map(|s| transformed_state(s, move_delta, angle_delta, center, follow_terrain, world))
            .collect()
    }

    fn apply(&mut self, world: &mut dyn World) -> Result<(), WorldError> {
        self.restore_reshaped(world);
        let targets = self.calculate_states(
            self.move_delta,
            self.angle_delta,
            self.center,
            self.follow_terrain,
            &*world,
        );

        // A guide commit only applies to a lone moved node. Its incident
        // tangents must be captured before the node moves, because straight
        // segments re-derive theirs from the moved chord.
        let guided_node = match (self.auto_curve, self.guide, targets.as_slice()) {
            (true, Some(guide), [state]) if state.id.kind == EntityKind::Node => {
                Some((state.id.index, state.position, guide))
            }
            _ => None,
        };
        let mut baseline = Vec::new();
        if let Some((node_index, _, _)) = guided_node
            && let Some(node) = world.node(node_index)
        {
            for seg_index in node.segments.into_iter().filter(|s| *s != 0) {
                if let Some(seg) = world.segment(seg_index) {
                    baseline.push((seg_index, seg.start_dir, seg.end_dir));
                }
            }
        }

        for (i, state) in targets.iter().enumerate() {
            if let Err(err) = write_state(world, state) {
                for original in &self.states[..=i] {
                    let _ = write_state(world, original);
                }
                return Err(err);
            }
        }
        if let Some((node_index, node_pos, guide)) = guided_node {
            self.commit_guide(world, node_index, node_pos, &guide, &baseline);
        }
        Ok(())
    }

    fn unapply(&mut self, world: &mut dyn World) -> Result<(), WorldError> {
        for state in &self.states {
            write_state(world, state)?;
        }
        self.restore_reshaped(world);
        Ok(())
    }

    fn restore_reshaped(&mut self, world: &mut dyn World) {
        for (segment, start_dir, end_dir) in self.reshaped.drain(..) {
            let _ = world.set_segment_geometry(segment, start_dir, end_dir);
        }
    }

    /// Bend the moved node's connections to its guide-construction
    /// neighbors so they follow the guide's curve. `baseline` holds the
    /// tangents from before the move; whatever gets reshaped is recorded
    /// from there so recompute and undo can put it back.
    fn commit_guide(
        &mut self,
        world: &mut dyn World,
        node_index: u32,
        node_pos: Vec3,
        guide: &SegmentGuide,
        baseline: &[(u32, Vec3, Vec3)],
    ) {
        let Some(curve) = guide.curve(&*world) else {
            return;
        };
        let (_, tangent) = curve.closest_xz(node_pos);
        for &(seg_index, prior_start, prior_end) in baseline {
            let Some(seg) = world.segment(seg_index) else {
                continue;
            };
            let far = if seg.start_node == node_index {
                seg.end_node
            } else {
                seg.start_node
            };
            // Direction into the segment at the far end / at the node.
            let (far_dir, node_dir) = if far == guide.start_node {
                (guide.start_dir, -tangent)
            } else if far == guide.end_node {
                (guide.end_dir, tangent)
            } else {
                continue;
            };
            let (start_dir, end_dir) = if seg.start_node == far {
                (far_dir, node_dir)
            } else {
                (node_dir, far_dir)
            };
            if world
                .set_segment_geometry(seg_index, start_dir, end_dir)
                .is_ok()
            {
                self.reshaped.push((seg_index, prior_start, prior_end));
            }
        }
    }
}

/// Duplicate the selection at an offset. The source snapshots stay fixed;
/// the created handles are recorded on the first apply so undo can remove
/// exactly those and a second apply is a no-op.
#[derive(Debug, Clone)]
pub struct CloneAction {
    states: Vec<EntityState>,
    pub center: Vec3,
    pub move_delta: Vec3,
    pub angle_delta: f32,
    pub follow_terrain: bool,
    created: Vec<EntityId>,
    previous_selection: HashSet<EntityId>,
}

impl CloneAction {
    pub fn new(selection: &Selection, world: &dyn World) -> Option<Self> {
        let ids = clean_selection(selection, world);
        let (states, center) = capture(&ids, world);
        if states.is_empty() {
            return None;
        }
        Some(Self {
            states,
            center,
            move_delta: Vec3::ZERO,
            angle_delta: 0.0,
            follow_terrain: true,
            created: Vec::new(),
            previous_selection: selection.as_set().clone(),
        })
    }

    /// Build from imported snapshot records (the paste half of
    /// export/import). `center` is the stored pivot.
    pub fn from_states(
        states: Vec<EntityState>,
        center: Vec3,
        selection: &Selection,
    ) -> Option<Self> {
        if states.is_empty() {
            return None;
        }
        Some(Self {
            states,
            center,
            move_delta: Vec3::ZERO,
            angle_delta: 0.0,
            follow_terrain: true,
            created: Vec::new(),
            previous_selection: selection.as_set().clone(),
        })
    }

    pub fn count(&self) -> usize {
        self.states.len()
    }

    pub fn states(&self) -> &[EntityState] {
        &self.states
    }

    pub fn created(&self) -> &[EntityId] {
        &self.created
    }

    pub fn calculate_states(
        &self,
        move_delta: Vec3,
        angle_delta: f32,
        center: Vec3,
        follow_terrain: bool,
        world: &dyn World,
    ) -> Vec<EntityState> {
        self.states
            .iter()
            .map(|s| transformed_state(s, move_delta, angle_delta, center, follow_terrain, world))
            .collect()
    }

    fn apply(&mut self, world: &mut dyn World, selection: &mut Selection) -> Result<(), WorldError> {
        if !self.created.is_empty() {
            return Ok(());
        }
        let mut targets = self.calculate_states(
            self.move_delta,
            self.angle_delta,
            self.center,
            self.follow_terrain,
            &*world,
        );
        // Nodes come to life first so segments can reference them, and
        // cloned segments get their endpoints remapped to the new indices.
        targets.sort_by_key(|s| match s.id.kind {
            EntityKind::Node => 0,
            EntityKind::Segment => 2,
            _ => 1,
        });

        let mut node_map: HashMap<u32, u32> = HashMap::new();
        let mut created = Vec::with_capacity(targets.len());
        for target in &targets {
            let mut state = target.clone();
            // Clones always take fresh slots.
            state.id.index = 0;
            if let StateExtra::Segment {
                start_node,
                end_node,
                ..
            } = &mut state.extra
            {
                *start_node = *node_map.get(start_node).unwrap_or(start_node);
                *end_node = *node_map.get(end_node).unwrap_or(end_node);
            }
            match world.create(&state) {
                Ok(id) => {
                    if id.kind == EntityKind::Node {
                        node_map.insert(target.id.index, id.index);
                    }
                    created.push(id);
                }
                Err(err) => {
                    for id in created.iter().rev() {
                        let _ = world.remove(*id);
                    }
                    return Err(err);
                }
            }
        }

        self.created = created;
        selection.set(self.created.iter().copied().collect());
        Ok(())
    }

    fn unapply(&mut self, world: &mut dyn World, selection: &mut Selection) -> Result<(), WorldError> {
        if self.created.is_empty() {
            return Ok(());
        }
        // Reverse creation order: segments go before the nodes they use.
        for id in self.created.iter().rev() {
            world.remove(*id)?;
        }
        self.created.clear();
        selection.set(self.previous_selection.clone());
        Ok(())
    }
}

/// A clone source must be self-contained: segments bring their endpoint
/// nodes along, and nodes that belong to a selected building are dropped
/// (they travel inside the building's own state).
fn clean_selection(selection: &Selection, world: &dyn World) -> Vec<EntityId> {
    let mut set: HashSet<EntityId> = selection.as_set().clone();
    for id in selection.iter() {
        if id.kind == EntityKind::Segment
            && let Some(seg) = world.segment(id.index)
        {
            set.insert(EntityId::node(seg.start_node));
            set.insert(EntityId::node(seg.end_node));
        }
    }
    for id in selection.iter() {
        if id.kind == EntityKind::Building
            && let Some(state) = world.entity_state(id)
            && let StateExtra::Building { sub_nodes, .. } = state.extra
        {
            for (node, _) in sub_nodes {
                set.remove(&EntityId::node(node));
            }
        }
    }
    let mut ids: Vec<EntityId> = set.into_iter().collect();
    ids.sort();
    ids
}

/// Set every target's height to one reference level.
#[derive(Debug, Clone)]
pub struct AlignHeightAction {
    states: Vec<EntityState>,
    pub height: f32,
}

impl AlignHeightAction {
    pub fn new(selection: &Selection, world: &dyn World, height: f32) -> Option<Self> {
        let (states, _) = capture(&selection.sorted(), world);
        if states.is_empty() {
            return None;
        }
        Some(Self { states, height })
    }

    fn leveled(&self, state: &EntityState) -> EntityState {
        let mut out = state.clone();
        let lift = self.height - state.position.y;
        out.position.y = self.height;
        match &mut out.extra {
            StateExtra::Building { sub_nodes, .. } => {
                for (_, p) in sub_nodes {
                    p.y += lift;
                }
            }
            StateExtra::Segment {
                start_pos, end_pos, ..
            } => {
                start_pos.y = self.height;
                end_pos.y = self.height;
            }
            _ => {}
        }
        out
    }

    fn apply(&self, world: &mut dyn World) -> Result<(), WorldError> {
        for (i, state) in self.states.iter().enumerate() {
            if let Err(err) = write_state(world, &self.leveled(state)) {
                for original in &self.states[..=i] {
                    let _ = write_state(world, original);
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn unapply(&self, world: &mut dyn World) -> Result<(), WorldError> {
        for state in &self.states {
            write_state(world, state)?;
        }
        Ok(())
    }
}

/// Remove the selection from the world; snapshots allow full recreation on
/// undo when the world supports create-from-state.
#[derive(Debug, Clone)]
pub struct BulldozeAction {
    /// In removal order: segments first, nodes last.
    states: Vec<EntityState>,
    removed: Vec<EntityId>,
    previous_selection: HashSet<EntityId>,
}

impl BulldozeAction {
    pub fn new(selection: &Selection, world: &dyn World) -> Option<Self> {
        let mut ids = selection.sorted();
        ids.sort_by_key(|id| match id.kind {
            EntityKind::Segment => 0,
            EntityKind::Node => 2,
            _ => 1,
        });
        let (states, _) = capture(&ids, world);
        if states.is_empty() {
            return None;
        }
        Some(Self {
            states,
            removed: Vec::new(),
            previous_selection: selection.as_set().clone(),
        })
    }

    fn apply(&mut self, world: &mut dyn World, selection: &mut Selection) -> Result<(), WorldError> {
        if !self.removed.is_empty() {
            return Ok(());
        }
        for (i, state) in self.states.iter().enumerate() {
            if let Err(err) = world.remove(state.id) {
                // Walk back in reverse so nodes exist again before the
                // segments that reference them.
                for prior in self.states[..i].iter().rev() {
                    let _ = world.create(prior);
                }
                return Err(err);
            }
        }
        self.removed = self.states.iter().map(|s| s.id).collect();
        selection.clear();
        Ok(())
    }

    fn unapply(&mut self, world: &mut dyn World, selection: &mut Selection) -> Result<(), WorldError> {
        if self.removed.is_empty() {
            return Ok(());
        }
        for state in self.states.iter().rev() {
            world.create(state)?;
        }
        self.removed.clear();
        selection.set(self.previous_selection.clone());
        Ok(())
    }
}

/// One reversible step of world editing. The variant set is closed, so
/// dispatch is an exhaustive match and the undo/redo laws can be checked
/// per variant.
#[derive(Debug, Clone)]
pub enum Action {
    Select(SelectAction),
    Transform(TransformAction),
    Clone(CloneAction),
    AlignHeight(AlignHeightAction),
    Bulldoze(BulldozeAction),
}

impl Action {
    /// Forward application. Safe to call again on the same action: every
    /// variant recomputes from its snapshots or guards against double
    /// creation/removal.
    pub fn apply(
        &mut self,
        world: &mut dyn World,
        selection: &mut Selection,
    ) -> Result<(), WorldError> {
        match self {
            Action::Select(a) => {
                a.apply(selection);
                Ok(())
            }
            Action::Transform(a) => a.apply(world),
            Action::Clone(a) => a.apply(world, selection),
            Action::AlignHeight(a) => a.apply(world),
            Action::Bulldoze(a) => a.apply(world, selection),
        }
    }

    /// Exact reversal from the captured snapshots. A no-op on an action
    /// that never took effect.
    pub fn unapply(
        &mut self,
        world: &mut dyn World,
        selection: &mut Selection,
    ) -> Result<(), WorldError> {
        match self {
            Action::Select(a) => {
                a.unapply(selection);
                Ok(())
            }
            Action::Transform(a) => a.unapply(world),
            Action::Clone(a) => a.unapply(world, selection),
            Action::AlignHeight(a) => a.unapply(world),
            Action::Bulldoze(a) => a.unapply(world, selection),
        }
    }

    /// Pivot for rotation deltas and the selection marker: the centroid of
    /// the target snapshots.
    pub fn center(&self) -> Option<Vec3> {
        match self {
            Action::Select(_) => None,
            Action::Transform(a) => Some(a.center()),
            Action::Clone(a) => Some(a.center),
            Action::AlignHeight(a) => centroid_of(&a.states),
            Action::Bulldoze(a) => centroid_of(&a.states),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Select(_) => "Select",
            Action::Transform(_) => "Transform",
            Action::Clone(_) => "Clone",
            Action::AlignHeight(_) => "Align Height",
            Action::Bulldoze(_) => "Bulldoze",
        }
    }
}
