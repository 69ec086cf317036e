use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use mushcore::metrics;
use mushcore::scripting::{
    HostApi, ScriptEngine, ScriptError, ScriptInvocation, ERR_ACTOR_NOT_FOUND, ERR_VALIDATION,
    HOOK_AREA_ENTERED, HOOK_AREA_LEFT, HOOK_CHARACTER_ENTERED, HOOK_CHARACTER_LEFT, HOOK_ITEM_TAKEN,
    HOST_OK, MAX_MESSAGES_PER_INVOCATION,
};
use mushcore::world::item::Item;
use mushcore::world::types::ItemLocation;
use mushcore::world::World;
mod common;
use common::{drain, player, run, test_config};

/// Engine that records every hook and greets the room on `character_entered`,
/// keeping what the host answered.
#[derive(Default)]
struct Greeter {
    calls: Mutex<Vec<(String, String)>>,
    codes: Mutex<Vec<i32>>,
}

impl ScriptEngine for Greeter {
    fn invoke(&self, host: &HostApi<'_>, invocation: &ScriptInvocation) -> Result<(), ScriptError> {
        self.calls
            .lock()
            .unwrap()
            .push((invocation.script.clone(), invocation.function.clone()));
        if invocation.function != HOOK_CHARACTER_ENTERED {
            return Ok(());
        }
        let room = host.room_id();
        let mut codes = self.codes.lock().unwrap();
        // One past the budget.
        for _ in 0..=MAX_MESSAGES_PER_INVOCATION {
            codes.push(host.emit_to_room(&room, &format!("The air shimmers around {}.", host.invoker_name())));
        }
        codes.push(host.emit_to_room("not-a-room", "lost"));
        codes.push(host.write_character_attribute("Nobody", "title", "x"));
        codes.push(host.write_character_attribute(host.invoker_name(), "mana", "9"));
        codes.push(host.write_character_attribute(host.invoker_name(), "title", "the Shimmering"));
        Ok(())
    }
}

struct Broken;

impl ScriptEngine for Broken {
    fn invoke(&self, _host: &HostApi<'_>, invocation: &ScriptInvocation) -> Result<(), ScriptError> {
        Err(ScriptError::Runtime {
            script: invocation.script.clone(),
            function: invocation.function.clone(),
            reason: "attempt to index a nil value".into(),
        })
    }
}

fn world_with(engine: Arc<dyn ScriptEngine>) -> World {
    let world = World::new(test_config()).expect("world").with_script_engine(engine);
    let shrine = world.create_room("The Shrine", "temple").expect("room");
    shrine.set_attribute("script", "shrine.lua").expect("script");
    world.start_room().link("east", &shrine).expect("link");
    world
}

#[test]
fn entering_a_scripted_room_runs_its_hook() {
    let engine = Arc::new(Greeter::default());
    let world = world_with(engine.clone());
    let alice = player(&world, "Alice");

    run(&world, &alice, "east");
    assert_eq!(
        engine.calls.lock().unwrap().as_slice(),
        &[
            ("shrine.lua".to_string(), HOOK_AREA_ENTERED.to_string()),
            ("shrine.lua".to_string(), HOOK_CHARACTER_ENTERED.to_string()),
        ]
    );
    let heard = drain(&alice);
    let shimmers = heard
        .iter()
        .filter(|m| *m == "The air shimmers around Alice.")
        .count();
    assert_eq!(shimmers, MAX_MESSAGES_PER_INVOCATION as usize);
    assert!(heard.last().expect("room view").starts_with("The Shrine"));
    assert_eq!(
        alice.character().expect("attached").attribute("title"),
        "the Shimmering"
    );
}

fn hooks(calls: &Mutex<Vec<(String, String)>>) -> Vec<(String, String)> {
    std::mem::take(&mut *calls.lock().unwrap())
}

fn call(script: &str, function: &str) -> (String, String) {
    (script.to_string(), function.to_string())
}

#[test]
fn area_hooks_fire_only_when_the_area_changes() {
    let engine = Arc::new(Greeter::default());
    let world = world_with(engine.clone());
    let shrine = world
        .start_room()
        .exit("east")
        .and_then(|id| world.room(id))
        .expect("shrine");
    let sanctum = world.create_room("The Sanctum", "temple").expect("room");
    sanctum.set_attribute("script", "sanctum.lua").expect("script");
    shrine.link("east", &sanctum).expect("link");
    sanctum.link("west", &shrine).expect("link back");
    shrine.link("west", world.start_room()).expect("link back");
    let alice = player(&world, "Alice");

    run(&world, &alice, "east");
    assert_eq!(
        hooks(&engine.calls),
        vec![call("shrine.lua", HOOK_AREA_ENTERED), call("shrine.lua", HOOK_CHARACTER_ENTERED)]
    );

    run(&world, &alice, "east");
    assert_eq!(
        hooks(&engine.calls),
        vec![call("shrine.lua", HOOK_CHARACTER_LEFT), call("sanctum.lua", HOOK_CHARACTER_ENTERED)]
    );

    run(&world, &alice, "west");
    hooks(&engine.calls);
    run(&world, &alice, "west");
    assert_eq!(
        hooks(&engine.calls),
        vec![call("shrine.lua", HOOK_AREA_LEFT), call("shrine.lua", HOOK_CHARACTER_LEFT)]
    );
}

#[test]
fn host_calls_report_error_codes() {
    let engine = Arc::new(Greeter::default());
    let world = world_with(engine.clone());
    let alice = player(&world, "Alice");
    run(&world, &alice, "east");

    let budget = MAX_MESSAGES_PER_INVOCATION as usize;
    let codes = engine.codes.lock().unwrap().clone();
    assert!(codes[..budget].iter().all(|&c| c == 1));
    assert_eq!(
        &codes[budget..],
        &[ERR_VALIDATION, ERR_VALIDATION, ERR_ACTOR_NOT_FOUND, ERR_VALIDATION, HOST_OK]
    );
}

#[test]
fn taking_a_scripted_item_runs_its_hook() {
    let engine = Arc::new(Greeter::default());
    let world = world_with(engine.clone());
    world
        .register_item(Item::new("Idol", HashMap::new()).expect("template").with_script("idol.lua"))
        .expect("register");
    let square = world.start_room().id();
    world.spawn_item("Idol", ItemLocation::Room(square)).expect("spawn");
    let alice = player(&world, "Alice");

    let out = run(&world, &alice, "get idol");
    assert_eq!(out[0], "You pick up the Idol.");
    assert_eq!(
        engine.calls.lock().unwrap().last().cloned(),
        Some(("idol.lua".to_string(), HOOK_ITEM_TAKEN.to_string()))
    );
}

#[test]
fn engine_failures_stay_out_of_the_players_view() {
    let world = world_with(Arc::new(Broken));
    let alice = player(&world, "Alice");
    let before = metrics::snapshot().script_failures;

    let out = run(&world, &alice, "east");
    assert_eq!(out.len(), 1);
    assert!(out[0].starts_with("The Shrine"));
    assert!(metrics::snapshot().script_failures > before);
}
