use std::collections::HashSet;
use troupe::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Gravity(f32);
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Transform(f32, f32);
#[derive(Clone, Copy, Debug, PartialEq)]
struct Marker;

#[test]
fn reused_slot_rejects_the_stale_handle() {
    let mut world = World::new();
    let a = world.spawn((Gravity(1.0),));
    world.despawn(a);
    let b = world.spawn((Gravity(2.0),));

    assert_eq!(a.slot(), b.slot());
    assert_ne!(a.generation(), b.generation());
    assert!(!world.is_alive(a));
    assert!(world.is_alive(b));

    // stale remove is a no-op; the live entity keeps its cell
    assert_eq!(world.remove::<Gravity>(a), None);
    assert_eq!(world.column_len::<Gravity>(), 1);

    assert_eq!(world.remove::<Gravity>(b), Some(Gravity(2.0)));
    assert_eq!(world.column_len::<Gravity>(), 0);
}

#[test]
fn add_remove_round_trip_restores_shape() {
    let mut world = World::new();
    let id = world.spawn((Transform::default(),));
    world.spawn((Gravity(1.0),));

    let transform_len = world.column_len::<Transform>();
    let gravity_len = world.column_len::<Gravity>();

    world.add(id, Gravity(5.0));
    world.remove::<Gravity>(id);

    assert_eq!(world.column_len::<Transform>(), transform_len);
    assert_eq!(world.column_len::<Gravity>(), gravity_len);
    let signature = world.entity_signature(id).unwrap();
    assert!(!signature.contains(troupe::component_tag_of::<Gravity>()));
    assert!(signature.contains(troupe::component_tag_of::<Transform>()));
}

#[test]
fn spawn_destroy_round_trip_restores_lengths() {
    let mut world = World::new();
    world.spawn((Transform::default(), Gravity(1.0)));
    let before_transform = world.column_len::<Transform>();
    let before_gravity = world.column_len::<Gravity>();
    let before_live = world.live_count();

    let id = world.spawn((Transform::default(), Gravity(2.0), Marker));
    world.despawn(id);

    assert_eq!(world.column_len::<Transform>(), before_transform);
    assert_eq!(world.column_len::<Gravity>(), before_gravity);
    assert_eq!(world.column_len::<Marker>(), 0);
    assert_eq!(world.live_count(), before_live);
}

#[test]
fn mutation_stream_keeps_membership_consistent() {
    let mut world = World::new();
    let mut ids = Vec::new();
    for i in 0..200u32 {
        let id = world.spawn((Transform(i as f32, 0.0),));
        if i % 2 == 0 {
            world.add(id, Gravity(i as f32));
        }
        if i % 5 == 0 {
            world.add(id, Marker);
        }
        ids.push(id);
    }
    for (i, id) in ids.iter().enumerate() {
        match i % 7 {
            0 => {
                world.remove::<Gravity>(*id);
            }
            1 => {
                world.despawn(*id);
            }
            2 => world.add(*id, Gravity(-1.0)),
            _ => {}
        }
    }

    // every query answer agrees with per-entity membership
    let mut expected = HashSet::new();
    for id in &ids {
        if world.is_alive(*id) && world.has::<Gravity>(*id) && !world.has::<Marker>(*id) {
            expected.insert(*id);
        }
    }
    let fetched: HashSet<EntityId> = world
        .query_read::<(EntityIdProbe, Read<Gravity>)>()
        .filter(without::<Marker>())
        .fetch_all()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(fetched, expected);

    // dense keys and the sparse maps stayed mirror images
    let keys: Vec<_> = world.column_keys::<Gravity>().to_vec();
    assert_eq!(keys.len(), world.column_len::<Gravity>());
    let distinct: HashSet<_> = keys.iter().collect();
    assert_eq!(distinct.len(), keys.len());
}

#[test]
fn command_integration_equals_direct_application() {
    let mut direct = World::new();
    let mut buffered = World::new();

    let script = |world: &mut World| -> Vec<EntityId> {
        (0..10)
            .map(|i| world.spawn((Transform(i as f32, 0.0),)))
            .collect()
    };
    let direct_ids = script(&mut direct);
    let buffered_ids = script(&mut buffered);

    // direct path
    direct.add(direct_ids[0], Gravity(1.0));
    direct.remove::<Transform>(direct_ids[1]);
    direct.despawn(direct_ids[2]);
    direct.spawn((Marker,));

    // identical log through a command buffer
    let mut commands = CommandBuffer::new();
    commands.add(buffered_ids[0], Gravity(1.0));
    commands.remove::<Transform>(buffered_ids[1]);
    commands.destroy(buffered_ids[2]);
    commands.spawn((Marker,));
    commands.integrate(&mut buffered);

    assert_eq!(direct.live_count(), buffered.live_count());
    assert_eq!(
        direct.column_len::<Transform>(),
        buffered.column_len::<Transform>()
    );
    assert_eq!(
        direct.column_len::<Gravity>(),
        buffered.column_len::<Gravity>()
    );
    assert_eq!(direct.column_len::<Marker>(), buffered.column_len::<Marker>());
    for (a, b) in direct_ids.iter().zip(&buffered_ids) {
        assert_eq!(direct.is_alive(*a), buffered.is_alive(*b));
        assert_eq!(direct.has::<Transform>(*a), buffered.has::<Transform>(*b));
        assert_eq!(direct.has::<Gravity>(*a), buffered.has::<Gravity>(*b));
    }
}

#[test]
fn command_run_receives_the_world() {
    let mut world = World::new();
    let id = world.spawn((Transform::default(),));

    let mut commands = CommandBuffer::new();
    commands.run(move |world| {
        world.add(id, Gravity(3.0));
    });
    commands.integrate(&mut world);

    assert_eq!(world.get::<Gravity>(id), Some(&Gravity(3.0)));
}

#[test]
fn spawn_with_callback_sees_the_new_entity() {
    let mut world = World::new();

    let mut commands = CommandBuffer::new();
    commands.spawn_with((Transform::default(),), |world, id| {
        world.add(id, Marker);
    });
    commands.integrate(&mut world);

    assert_eq!(world.live_count(), 1);
    assert_eq!(world.column_len::<Marker>(), 1);
}

#[test]
fn resource_versions_track_writes() {
    let mut world = World::new();
    world.insert_resource(Gravity(-9.8));
    world.insert_resource(Transform::default());

    let snapshot = world.make_resource_version_snapshot();
    assert!(world.updated_resources_since(snapshot).is_empty());

    world.resource_mut::<Gravity>().0 = -1.6;
    let updated = world.updated_resources_since(snapshot);
    assert_eq!(updated.len(), 1);

    // a read does not register as an update
    assert_eq!(world.resource::<Transform>().0, 0.0);
    assert_eq!(world.updated_resources_since(snapshot).len(), 1);
}

#[test]
fn get_mut_marks_cells_changed() {
    let mut world = World::new();
    let id = world.spawn((Transform::default(),));
    world.advance_change_tick();
    let tick = world.current_tick();

    world.get_mut::<Transform>(id).unwrap().0 = 4.0;

    let changed: Vec<EntityId> = world
        .query_read::<EntityIdProbe>()
        .filter(changed::<Transform>())
        .with_window(TickWindow::new(tick - 1, tick))
        .fetch_all()
        .collect();
    assert_eq!(changed, vec![id]);
}
