//! Traffic Light Hierarchical State Machine
//!
//! This example demonstrates nested states driven by messages.
//!
//! Key concepts:
//! - Substates with a default child ("on" starts at "red")
//! - Transition tables keyed by message name
//! - Messages bubbling down the active chain
//! - Delegated methods answered by the active color
//! - Rewinding history
//!
//! Run with: cargo run --example traffic_light

use commonwealth::{lifecycle, transition_table, StateError, StateNode};
use serde_json::{json, Value};

fn build() -> Result<StateNode, StateError> {
    let light = StateNode::new("traffic light");
    let on = light.add_substate("on")?;
    light.add_substate("off")?;

    for (color, advice) in [("red", "Stop"), ("green", "Go!"), ("yellow", "Caution")] {
        let state = on.add_substate(color)?;
        state.define_method("advice", move |_: &StateNode, _: &[Value]| Ok(json!(advice)))?;
        state.set_enter(lifecycle(|state| {
            println!("  entering {state}");
            Ok(())
        }));
    }
    on.set_default_state(Some("red".to_string()));
    on.set_reset_on_enter(true);

    light.add_transition("on", transition_table! { "null" => "on", "off" => "on" });
    light.add_transition("off", transition_table! { "*" => "off" });
    on.add_transition(
        "change",
        transition_table! {
            "red" => "green",
            "green" => "yellow",
            "yellow" => "red",
        },
    );

    light.add_state_method("advice", None)?;
    Ok(light)
}

fn main() -> Result<(), StateError> {
    println!("=== Traffic Light State Machine ===\n");

    let light = build()?;
    println!("Initial state: {:?}\n", light.current_state());

    println!("Turning on:");
    light.dispatch("on", &[])?;
    println!("  advice: {}\n", light.call("advice", &[])?);

    println!("Cycling colors:");
    for _ in 0..3 {
        light.dispatch("change", &[])?;
        println!("  advice: {}", light.call("advice", &[])?);
    }

    println!("\nTurning off and back on (\"on\" resets to red):");
    light.dispatch("change", &[])?;
    light.dispatch("off", &[])?;
    println!("  advice while off: {}", light.call("advice", &[])?);
    light.dispatch("on", &[])?;

    let chain: Vec<String> = light
        .state_chain_to_array()
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("  active chain: {}\n", chain.join(" -> "));

    println!("Rewinding one step:");
    light.rewind(1)?;
    println!("  now: {}", light.final_current_state());

    println!("\n=== Example Complete ===");
    Ok(())
}
