//! Controller-level reconciliation tests against the in-memory tree.

use weft_core::{
    Anchor, FragmentPart, KeyedList, MemoryTree, NoTransition, NodeId, PartFlags, RenderResult,
    ShapeKey,
};
use weft_testing::{
    event_log, EventLog, PartEvent, RecordingPart, RecordingTransition, SplitMix64,
    TransitionEvent,
};

const ITEM_SHAPE: ShapeKey = 1;
const WIDE_SHAPE: ShapeKey = 2;
const GHOST_SHAPE: ShapeKey = 3;

fn rendered(item: &u32, index: usize) -> Vec<String> {
    vec![format!("{item}@{index}")]
}

fn setup() -> (MemoryTree, NodeId, KeyedList<u32, MemoryTree>) {
    let mut tree = MemoryTree::new();
    tree.register_shape(ITEM_SHAPE, 1);
    tree.register_shape(WIDE_SHAPE, 2);
    let root = tree.new_container();
    let list: KeyedList<u32, MemoryTree> = KeyedList::new(Anchor::EndOf(root), |item, index| {
        RenderResult::new(ITEM_SHAPE, rendered(item, index))
    });
    (tree, root, list)
}

fn child_values(tree: &MemoryTree, root: NodeId) -> Vec<String> {
    tree.children(root)
        .iter()
        .map(|&node| tree.values(node).join(","))
        .collect()
}

fn expected_values(data: &[u32]) -> Vec<String> {
    data.iter()
        .enumerate()
        .map(|(index, item)| rendered(item, index).join(","))
        .collect()
}

#[test]
fn populates_from_empty_in_order() {
    let (mut tree, root, mut list) = setup();
    let mut transition = RecordingTransition::new();
    list.update(&mut tree, &mut transition, vec![1, 2, 3])
        .unwrap();

    assert_eq!(list.len(), 3);
    assert_eq!(child_values(&tree, root), expected_values(&[1, 2, 3]));
    let enters = transition
        .events()
        .iter()
        .filter(|event| matches!(event, TransitionEvent::Enter { animate: true, .. }))
        .count();
    assert_eq!(enters, 3);
}

#[test]
fn identical_update_patches_in_place() {
    let (mut tree, root, mut list) = setup();
    let mut transition = NoTransition;
    list.update(&mut tree, &mut transition, vec![4, 5]).unwrap();
    let before: Vec<NodeId> = tree.children(root).to_vec();

    list.update(&mut tree, &mut transition, vec![4, 5]).unwrap();
    assert_eq!(tree.children(root), before.as_slice());
    assert_eq!(child_values(&tree, root), expected_values(&[4, 5]));
}

#[test]
fn reorder_preserves_nodes_and_stays_silent() {
    let (mut tree, root, mut list) = setup();
    let mut transition = RecordingTransition::new();
    list.update(&mut tree, &mut transition, vec![1, 2, 3])
        .unwrap();
    let mut before: Vec<NodeId> = tree.children(root).to_vec();
    transition.log.borrow_mut().clear();

    list.update(&mut tree, &mut transition, vec![3, 2, 1])
        .unwrap();
    assert_eq!(child_values(&tree, root), expected_values(&[3, 2, 1]));

    // same nodes, new order
    let mut after: Vec<NodeId> = tree.children(root).to_vec();
    before.sort_unstable();
    after.sort_unstable();
    assert_eq!(before, after);

    // a pure reorder never carries animation eligibility
    for event in transition.events() {
        match event {
            TransitionEvent::Enter { animate, .. } | TransitionEvent::Leave { animate, .. } => {
                assert!(!animate, "reorder must not animate")
            }
            TransitionEvent::Cancel { .. } => panic!("nothing to cancel"),
        }
    }
}

#[test]
fn parts_observe_relocation_as_immediate_move() {
    let mut tree = MemoryTree::new();
    let log: EventLog<PartEvent> = event_log();
    let parts_log = log.clone();
    tree.register_shape_with_parts(ITEM_SHAPE, 1, move || {
        vec![
            FragmentPart::direct(Box::new(RecordingPart::new("binding", parts_log.clone()))),
            FragmentPart::nested(Box::new(RecordingPart::new("inner", parts_log.clone()))),
        ]
    });
    let root = tree.new_container();
    let mut list: KeyedList<u32, MemoryTree> = KeyedList::new(Anchor::EndOf(root), |item, index| {
        RenderResult::new(ITEM_SHAPE, rendered(item, index))
    });
    let mut transition = NoTransition;
    list.update(&mut tree, &mut transition, vec![1, 2, 3])
        .unwrap();

    // initial mount: direct parts carry the direct bit, nested do not
    for event in log.borrow().iter() {
        match event {
            PartEvent::Connect { label, flags } => {
                assert!(flags.contains(PartFlags::FROM_OWN_STATE_CHANGE));
                assert_eq!(*label == "binding", flags.contains(PartFlags::AS_DIRECT_NODE));
            }
            PartEvent::Disconnect { .. } => panic!("no disconnect during mount"),
        }
    }
    log.borrow_mut().clear();

    list.update(&mut tree, &mut transition, vec![3, 2, 1])
        .unwrap();

    // two relocations, each a disconnect/reconnect pair; the stable item
    // stays quiet and nothing beneath a moved instance may animate
    let events = log.borrow();
    assert_eq!(events.len(), 8);
    for event in events.iter() {
        let flags = match event {
            PartEvent::Connect { flags, .. } | PartEvent::Disconnect { flags, .. } => *flags,
        };
        assert!(flags.contains(PartFlags::MOVE_IMMEDIATELY));
        assert!(!flags.should_animate());
    }
}

#[test]
fn shape_change_discards_and_recreates() {
    let mut tree = MemoryTree::new();
    tree.register_shape(ITEM_SHAPE, 1);
    tree.register_shape(WIDE_SHAPE, 2);
    let root = tree.new_container();
    // items >= 10 render the two-node shape
    let mut list: KeyedList<u32, MemoryTree> = KeyedList::new(Anchor::EndOf(root), |item, index| {
        let shape = if *item >= 10 { WIDE_SHAPE } else { ITEM_SHAPE };
        RenderResult::new(shape, rendered(item, index))
    });
    let mut transition = RecordingTransition::new();
    list.update(&mut tree, &mut transition, vec![1]).unwrap();
    let old_node = tree.children(root)[0];
    transition.log.borrow_mut().clear();

    // 1 vanishes, 12 arrives: the planner recycles the instance, but the
    // shape no longer matches, so it is destroyed and rebuilt
    list.update(&mut tree, &mut transition, vec![12]).unwrap();
    assert_eq!(tree.children(root).len(), 2);
    assert!(!tree.children(root).contains(&old_node));
    // every node of the fragment carries the one rendered value bundle
    assert_eq!(child_values(&tree, root), vec!["12@0".to_owned(); 2]);

    let events = transition.events();
    assert!(events
        .iter()
        .any(|event| matches!(event, TransitionEvent::Leave { animate: true, .. })));
    assert!(events
        .iter()
        .any(|event| matches!(event, TransitionEvent::Enter { animate: true, .. })));
}

#[test]
fn empty_fragment_boundary_keeps_insertion_order() {
    let mut tree = MemoryTree::new();
    tree.register_shape(ITEM_SHAPE, 1);
    tree.register_shape(GHOST_SHAPE, 0);
    let root = tree.new_container();
    // item 0 renders a shape with no nodes at all
    let mut list: KeyedList<u32, MemoryTree> = KeyedList::new(Anchor::EndOf(root), |item, index| {
        let shape = if *item == 0 { GHOST_SHAPE } else { ITEM_SHAPE };
        RenderResult::new(shape, rendered(item, index))
    });
    let mut transition = NoTransition;
    list.update(&mut tree, &mut transition, vec![0, 1]).unwrap();
    assert_eq!(child_values(&tree, root), vec!["1@1"]);

    // new head content lands in front of the node-less instance, not at
    // the end of the list
    list.update(&mut tree, &mut transition, vec![2, 0, 1])
        .unwrap();
    assert_eq!(child_values(&tree, root), vec!["2@0", "1@2"]);

    // and the node-less instance stays addressable for the next insertion
    list.update(&mut tree, &mut transition, vec![2, 3, 0, 1])
        .unwrap();
    assert_eq!(child_values(&tree, root), vec!["2@0", "3@1", "1@3"]);
}

#[test]
fn node_less_boundary_swap_leaves_the_tree_alone() {
    let mut tree = MemoryTree::new();
    tree.register_shape(ITEM_SHAPE, 1);
    tree.register_shape(GHOST_SHAPE, 0);
    let root = tree.new_container();
    let mut list: KeyedList<u32, MemoryTree> = KeyedList::new(Anchor::EndOf(root), |item, index| {
        let shape = if *item == 0 { GHOST_SHAPE } else { ITEM_SHAPE };
        RenderResult::new(shape, rendered(item, index))
    });
    let mut transition = NoTransition;
    list.update(&mut tree, &mut transition, vec![0, 1]).unwrap();
    let before: Vec<NodeId> = tree.children(root).to_vec();

    // 1 moves in front of the node-less 0 sitting right behind it; the
    // tree already has the right shape, only the logical order flips
    list.update(&mut tree, &mut transition, vec![1, 0]).unwrap();
    assert_eq!(tree.children(root), before.as_slice());
    assert_eq!(child_values(&tree, root), vec!["1@0"]);

    // both instances remain addressable afterwards
    list.update(&mut tree, &mut transition, vec![1, 2, 0])
        .unwrap();
    assert_eq!(child_values(&tree, root), vec!["1@0", "2@1"]);
    list.update(&mut tree, &mut transition, vec![1, 2, 3, 0])
        .unwrap();
    assert_eq!(child_values(&tree, root), vec!["1@0", "2@1", "3@2"]);
}

#[test]
fn shape_change_during_swap_rebuilds_in_place() {
    let mut tree = MemoryTree::new();
    tree.register_shape(ITEM_SHAPE, 1);
    tree.register_shape(WIDE_SHAPE, 2);
    tree.register_shape(GHOST_SHAPE, 0);
    let root = tree.new_container();
    // item 1 widens when it reaches the head of the list
    let mut list: KeyedList<u32, MemoryTree> = KeyedList::new(Anchor::EndOf(root), |item, index| {
        let shape = match (*item, index) {
            (0, _) => GHOST_SHAPE,
            (1, 0) => WIDE_SHAPE,
            _ => ITEM_SHAPE,
        };
        RenderResult::new(shape, rendered(item, index))
    });
    let mut transition = NoTransition;
    list.update(&mut tree, &mut transition, vec![0, 1]).unwrap();
    assert_eq!(child_values(&tree, root), vec!["1@1"]);

    // the swap lands 1 at the head where it renders the two-node shape;
    // the stale fragment goes away and the fresh one fills its spot
    list.update(&mut tree, &mut transition, vec![1, 0]).unwrap();
    assert_eq!(child_values(&tree, root), vec!["1@0"; 2]);

    list.update(&mut tree, &mut transition, vec![1, 2, 0])
        .unwrap();
    assert_eq!(child_values(&tree, root), vec!["1@0", "1@0", "2@1"]);
}

#[test]
fn items_do_not_need_clone() {
    #[derive(PartialEq, Eq, Hash)]
    struct Label(&'static str);

    let mut tree = MemoryTree::new();
    tree.register_shape(ITEM_SHAPE, 1);
    let root = tree.new_container();
    let mut list: KeyedList<Label, MemoryTree> =
        KeyedList::new(Anchor::EndOf(root), |item: &Label, index| {
            RenderResult::new(ITEM_SHAPE, vec![format!("{}@{index}", item.0)])
        });
    let mut transition = NoTransition;
    list.update(&mut tree, &mut transition, vec![Label("a"), Label("b")])
        .unwrap();
    list.update(&mut tree, &mut transition, vec![Label("b"), Label("a")])
        .unwrap();
    assert_eq!(child_values(&tree, root), vec!["b@0", "a@1"]);
}

#[test]
fn animated_teardown_defers_detachment_until_reaped() {
    let (mut tree, root, mut list) = setup();
    let mut transition = RecordingTransition::deferring();
    list.update(&mut tree, &mut transition, vec![1, 2]).unwrap();
    let doomed = tree.children(root)[1];

    list.update(&mut tree, &mut transition, vec![1]).unwrap();
    // still attached while the leave animation runs
    assert!(tree.children(root).contains(&doomed));
    assert_eq!(list.detaching_len(), 1);

    list.reap(&mut tree).unwrap();
    assert_eq!(list.detaching_len(), 1, "unresolved teardown stays");

    transition.finish_leaves();
    list.reap(&mut tree).unwrap();
    assert_eq!(list.detaching_len(), 0);
    assert!(!tree.children(root).contains(&doomed));
    assert_eq!(child_values(&tree, root), expected_values(&[1]));
}

#[test]
fn next_update_cancels_inflight_teardown() {
    let (mut tree, root, mut list) = setup();
    let mut transition = RecordingTransition::deferring();
    list.update(&mut tree, &mut transition, vec![1, 2]).unwrap();
    let doomed = tree.children(root)[1];

    list.update(&mut tree, &mut transition, vec![1]).unwrap();
    assert!(tree.children(root).contains(&doomed));

    list.update(&mut tree, &mut transition, vec![1, 3]).unwrap();
    assert!(!tree.children(root).contains(&doomed));
    assert_eq!(list.detaching_len(), 0);
    assert!(transition
        .events()
        .iter()
        .any(|event| matches!(event, TransitionEvent::Cancel { nodes } if nodes.contains(&doomed))));
    assert_eq!(child_values(&tree, root), expected_values(&[1, 3]));
}

#[test]
fn random_update_sequences_keep_order_invariant() {
    let (mut tree, root, mut list) = setup();
    let mut transition = NoTransition;
    let mut rng = SplitMix64::new(0xC0FFEE);

    for _ in 0..120 {
        let len = rng.below(9) as usize;
        let mut universe: Vec<u32> = (0..12).collect();
        for index in (1..universe.len()).rev() {
            let other = rng.below(index as u64 + 1) as usize;
            universe.swap(index, other);
        }
        let data: Vec<u32> = universe[..len].to_vec();
        list.update(&mut tree, &mut transition, data.clone())
            .unwrap();

        assert_eq!(list.len(), data.len());
        assert_eq!(list.data(), data.as_slice());
        assert_eq!(child_values(&tree, root), expected_values(&data));
    }
}
