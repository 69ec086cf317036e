use std::collections::HashMap;

use mushcore::world::item::Item;
use mushcore::world::records::{CharacterRecord, ItemInstanceRecord, LocationType, RoomRecord};
use mushcore::world::types::{EntityId, ItemLocation};
use mushcore::world::World;
mod common;
use common::{player, run, test_config, test_world, PASSWORD};

fn with_templates(world: &World) {
    let mut attrs = HashMap::new();
    attrs.insert("description".to_string(), "A dented tin cup.".to_string());
    world
        .register_item(Item::new("Cup", attrs).expect("template"))
        .expect("register");
}

// Save a character and what it carries to JSON, load it into an empty world,
// and log in again.
#[test]
fn saved_character_logs_in_on_a_fresh_world() {
    let world = test_world();
    with_templates(&world);
    let alice = player(&world, "Alice");
    let character = alice.character().expect("attached");
    character.set_attribute("title", "the Thirsty").expect("title");
    let cup = world
        .spawn_item("Cup", ItemLocation::Character(character.id()))
        .expect("spawn");
    cup.set_attribute("description", "A cup with a chipped rim.").expect("overlay");

    let saved_character = serde_json::to_string(&character.to_record()).expect("serialize");
    let saved_cup = serde_json::to_string(&cup.to_record()).expect("serialize");

    let fresh = test_world();
    with_templates(&fresh);
    let record: CharacterRecord = serde_json::from_str(&saved_character).expect("parse");
    let restored = fresh.restore_character(&record, None).expect("restore character");
    let cup_record: ItemInstanceRecord = serde_json::from_str(&saved_cup).expect("parse");
    assert_eq!(cup_record.location_type, LocationType::Character);
    let restored_cup = fresh.restore_item_instance(&cup_record).expect("restore cup");

    assert_eq!(restored.to_record(), character.to_record());
    assert_eq!(restored_cup.attribute("description"), "A cup with a chipped rim.");

    let (session, _) = common::connect(&fresh, "returning");
    let out = run(&fresh, &session, &format!("login Alice {}", PASSWORD));
    assert_eq!(out[0], "Welcome back, Alice.");
    assert_eq!(
        run(&fresh, &session, "inventory"),
        vec!["You are carrying (1/35): Cup".to_string()]
    );
}

#[test]
fn unknown_template_is_refused_on_restore() {
    let world = test_world();
    with_templates(&world);
    let square = world.start_room().id();
    let cup = world.spawn_item("Cup", ItemLocation::Room(square)).expect("spawn");
    let record = cup.to_record();

    let fresh = test_world();
    assert!(fresh.restore_item_instance(&record).is_err());
}

fn fixed_start_world() -> World {
    let mut config = test_config();
    config.world.start_room_id = Some(
        "6f1c2a7e-3d5b-4c8e-9a0f-1b2c3d4e5f60"
            .parse::<EntityId>()
            .expect("uuid"),
    );
    World::new(config).expect("world")
}

// Rooms, the character standing in one and the items lying in both survive a
// save and load into a fresh world that shares the start room id.
#[test]
fn rooms_restore_with_their_contents() {
    let world = fixed_start_world();
    with_templates(&world);
    let garden = world.create_room("The Garden", "town").expect("room");
    world.start_room().link("north", &garden).expect("link");
    garden.link("south", world.start_room()).expect("link back");
    let square = world.start_room().id();
    let dropped = world.spawn_item("Cup", ItemLocation::Room(square)).expect("spawn");
    let alice = player(&world, "Alice");
    run(&world, &alice, "north");
    let character = alice.character().expect("attached");
    let left = world.spawn_item("Cup", ItemLocation::Room(garden.id())).expect("spawn");

    let saved_rooms: Vec<String> = [world.start_room().to_record(), garden.to_record()]
        .iter()
        .map(|r| serde_json::to_string(r).expect("serialize"))
        .collect();
    let saved_character = character.to_record();
    let saved_items = [dropped.to_record(), left.to_record()];

    let fresh = fixed_start_world();
    with_templates(&fresh);
    for saved in &saved_rooms {
        let record: RoomRecord = serde_json::from_str(saved).expect("parse");
        fresh.restore_room(&record).expect("restore room");
    }
    let restored = fresh
        .restore_character(&saved_character, Some(garden.id()))
        .expect("restore character");
    for record in &saved_items {
        fresh.restore_item_instance(record).expect("restore item");
    }
    assert_eq!(fresh.release_unclaimed_slots(), 0);

    assert_eq!(fresh.start_room().id(), square);
    assert!(fresh.start_room().here().contains(dropped.id()));
    assert_eq!(fresh.room_of(restored.id()).map(|r| r.id()), Some(garden.id()));
    assert_eq!(
        fresh.registry().lookup_container(left.id()).map(|c| c.id()),
        fresh.room(garden.id()).map(|r| r.here().id())
    );

    let (session, _) = common::connect(&fresh, "returning");
    run(&fresh, &session, &format!("login Alice {}", PASSWORD));
    let view = run(&fresh, &session, "look");
    assert!(view[0].starts_with("The Garden"));
    assert!(view[0].contains("You see: Cup"));
    assert!(run(&fresh, &session, "south")[0].starts_with("The Town Square"));
}

// An inventory slot whose item cannot be restored is freed instead of
// counting against capacity forever.
#[test]
fn unrestored_inventory_slots_are_released() {
    let world = test_world();
    with_templates(&world);
    let alice = player(&world, "Alice");
    let character = alice.character().expect("attached");
    let cup = world
        .spawn_item("Cup", ItemLocation::Character(character.id()))
        .expect("spawn");
    let saved_character = character.to_record();
    let saved_cup = cup.to_record();

    let fresh = test_world();
    let restored = fresh.restore_character(&saved_character, None).expect("restore");
    assert!(fresh.restore_item_instance(&saved_cup).is_err());
    assert_eq!(restored.inventory().len(), 1);

    assert_eq!(fresh.release_unclaimed_slots(), 1);
    assert!(restored.inventory().is_empty());
    assert_eq!(fresh.release_unclaimed_slots(), 0);

    let (session, _) = common::connect(&fresh, "returning");
    run(&fresh, &session, &format!("login Alice {}", PASSWORD));
    assert_eq!(
        run(&fresh, &session, "inventory"),
        vec!["You are not carrying anything.".to_string()]
    );
}
