//! Group chat and router behavior over real agents.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;

use convoy::agent::{Agent, AgentConfig};
use convoy::agent_loop::RunStatus;
use convoy::coordinator::{
    GroupChat, GroupChatConfig, KeywordRoutingStrategy, KeywordRule, ModelRoutingStrategy, Router,
    RouterConfig,
};
use convoy::gateway::ModelGateway;
use convoy::tools::ToolRegistry;
use convoy::types::{Message, Role, Transcript};
use convoy::ConvoyError;

use common::{RepeatingGateway, ScriptedGateway};

fn user_transcript(text: &str) -> Transcript {
    let mut transcript = Transcript::new();
    transcript.push(Message::user(text));
    transcript
}

fn chatty_agent(name: &'static str, reply: &str) -> (Arc<Agent>, Arc<RepeatingGateway>) {
    let gateway = Arc::new(RepeatingGateway::new(Message::assistant(reply)));
    let agent = Agent::new(
        AgentConfig::new(name),
        Arc::clone(&gateway) as Arc<dyn ModelGateway>,
        Arc::new(ToolRegistry::new()),
    )
    .unwrap();
    (Arc::new(agent), gateway)
}

#[tokio::test]
async fn group_chat_rotates_through_the_roster() {
    let (a, _) = chatty_agent("alpha", "alpha here");
    let (b, _) = chatty_agent("beta", "beta here");
    let (c, _) = chatty_agent("gamma", "gamma here");

    let chat = GroupChat::new(
        vec![a, b, c],
        GroupChatConfig {
            max_rounds: 5,
            termination_phrase: None,
        },
    )
    .unwrap();

    let outcome = chat.run(user_transcript("discuss")).await.unwrap();

    assert_eq!(outcome.rounds, 5);
    assert_eq!(outcome.speakers, vec!["alpha", "beta", "gamma", "alpha", "beta"]);
    assert!(outcome.is_success());

    // Every reply lands in the shared transcript, attributed to its speaker.
    let speakers_in_transcript: Vec<&str> = outcome
        .transcript
        .messages()
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .filter_map(|m| m.name.as_deref())
        .collect();
    assert_eq!(
        speakers_in_transcript,
        vec!["alpha", "beta", "gamma", "alpha", "beta"]
    );
}

#[tokio::test]
async fn group_chat_stops_on_termination_phrase() {
    let (a, _) = chatty_agent("opener", "let me start");
    let (b, _) = chatty_agent("closer", "all settled, TERMINATE");

    let chat = GroupChat::new(
        vec![a, b],
        GroupChatConfig {
            max_rounds: 10,
            termination_phrase: Some("TERMINATE".into()),
        },
    )
    .unwrap();

    let outcome = chat.run(user_transcript("settle this")).await.unwrap();

    assert_eq!(outcome.rounds, 2);
    assert_eq!(outcome.speakers, vec!["opener", "closer"]);
}

#[tokio::test]
async fn group_chat_surfaces_a_failed_agent_run() {
    let (ok, _) = chatty_agent("fine", "all good");
    let broken = Arc::new(
        Agent::new(
            AgentConfig::new("broken"),
            // Empty script: the first query fails.
            Arc::new(ScriptedGateway::new(Vec::new())) as Arc<dyn ModelGateway>,
            Arc::new(ToolRegistry::new()),
        )
        .unwrap(),
    );

    let chat = GroupChat::new(
        vec![ok, broken],
        GroupChatConfig {
            max_rounds: 4,
            termination_phrase: None,
        },
    )
    .unwrap();

    let outcome = chat.run(user_transcript("go")).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(outcome.rounds, 2);
    // The first agent's reply is kept.
    assert!(outcome
        .transcript
        .messages()
        .iter()
        .any(|m| m.content == "all good"));
}

#[tokio::test]
async fn router_dispatches_only_the_selected_agent() {
    let (math, math_gateway) = chatty_agent("math", "the answer is 12");
    let (general, general_gateway) = chatty_agent("general", "let me help");

    let router = Router::new(
        vec![math, general],
        Box::new(KeywordRoutingStrategy::new(vec![
            KeywordRule::new("math", ["sum", "multiply", "divide"]),
            KeywordRule::new("general", ["hello", "weather"]),
        ])),
        RouterConfig::default(),
    )
    .unwrap();

    let result = router
        .dispatch(user_transcript("What is the sum of 5 and 7?"))
        .await
        .unwrap();

    assert_eq!(result.decision.selected_agent, "math");
    assert!(result.decision.confidence > 0.0);
    assert_eq!(result.outcome.final_text(), Some("the answer is 12"));
    assert_eq!(math_gateway.calls(), 1);
    assert_eq!(general_gateway.calls(), 0);
}

#[tokio::test]
async fn router_fails_without_match_or_default() {
    let (math, _) = chatty_agent("math", "numbers");

    let router = Router::new(
        vec![math],
        Box::new(KeywordRoutingStrategy::new(vec![KeywordRule::new(
            "math",
            ["sum"],
        )])),
        RouterConfig::default(),
    )
    .unwrap();

    let err = router
        .route(&user_transcript("tell me a joke"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConvoyError::NoAgentMatched { best: None }));
}

#[tokio::test]
async fn router_falls_back_to_default_agent() {
    let (math, math_gateway) = chatty_agent("math", "numbers");
    let (general, general_gateway) = chatty_agent("general", "happy to chat");

    let router = Router::new(
        vec![math, general],
        Box::new(KeywordRoutingStrategy::new(vec![KeywordRule::new(
            "math",
            ["sum"],
        )])),
        RouterConfig {
            confidence_threshold: 0.5,
            default_agent: Some("general".into()),
        },
    )
    .unwrap();

    let result = router.dispatch(user_transcript("tell me a joke")).await.unwrap();

    assert_eq!(result.decision.selected_agent, "general");
    assert!(result.decision.rationale.contains("default"));
    assert_eq!(general_gateway.calls(), 1);
    assert_eq!(math_gateway.calls(), 0);
}

#[tokio::test]
async fn model_strategy_routes_via_call_protocol() {
    let (math, math_gateway) = chatty_agent("math", "6 times 7 is 42");
    let (general, _) = chatty_agent("general", "hello");

    // The routing model answers with the hand-off line.
    let router_model = Arc::new(ScriptedGateway::new(vec![Message::assistant("Call: math")]));
    let router = Router::new(
        vec![math, general],
        Box::new(ModelRoutingStrategy::new(
            Arc::clone(&router_model) as Arc<dyn ModelGateway>
        )),
        RouterConfig::default(),
    )
    .unwrap();

    let result = router
        .dispatch(user_transcript("What is 6 times 7?"))
        .await
        .unwrap();

    assert_eq!(result.decision.selected_agent, "math");
    assert_eq!(result.decision.confidence, 1.0);
    assert_eq!(router_model.calls(), 1);
    assert_eq!(math_gateway.calls(), 1);
    assert_eq!(result.outcome.final_text(), Some("6 times 7 is 42"));
}

#[tokio::test]
async fn model_strategy_rejects_unknown_agent_name() {
    let (math, _) = chatty_agent("math", "numbers");

    let router_model = Arc::new(ScriptedGateway::new(vec![Message::assistant(
        "Call: astrology",
    )]));
    let router = Router::new(
        vec![math],
        Box::new(ModelRoutingStrategy::new(
            router_model as Arc<dyn ModelGateway>
        )),
        RouterConfig::default(),
    )
    .unwrap();

    let err = router
        .route(&user_transcript("what do the stars say"))
        .await
        .unwrap_err();
    match err {
        ConvoyError::NoAgentMatched { best } => assert_eq!(best.as_deref(), Some("astrology")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn router_rejects_empty_roster() {
    let err = Router::new(
        Vec::new(),
        Box::new(KeywordRoutingStrategy::new(Vec::new())),
        RouterConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ConvoyError::InvalidArgument(_)));
}
