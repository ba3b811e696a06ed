//! End-to-end query scenarios over the façade and grep pipeline.

mod common;

use common::{blueprint, class, function, hit, source_file, StubEngine, TestEnv};
use uindex::grep::{GrepRequest, GrepResults};
use uindex::ingest::IngestRequest;
use uindex::query::{
    FindChildrenArgs, FindMemberArgs, FindTypeArgs, QueryRequest, QueryResponse,
};

fn find_type_args(name: &str) -> FindTypeArgs {
    FindTypeArgs {
        name: name.to_string(),
        fuzzy: false,
        project: None,
        language: None,
        kind: None,
        max_results: 10,
        include_assets: false,
        context_lines: 0,
    }
}

fn grep_request(pattern: &str) -> GrepRequest {
    GrepRequest {
        pattern: pattern.to_string(),
        project: None,
        language: None,
        case_sensitive: false,
        max_results: 20,
        context_lines: 0,
        grouped: false,
        include_assets: false,
        symbols: false,
    }
}

#[tokio::test]
async fn prefix_variant_exact_scenario() {
    let env = TestEnv::new();
    let mut file = source_file("/game/Source/GameMode.h", "Game", 1);
    file.types = vec![class("AEmbarkGameMode", Some("AGameModeBase"), 12)];
    env.ingest_file(file);

    let response = env
        .query
        .dispatch(QueryRequest::FindType(find_type_args("EmbarkGameMode")))
        .await
        .unwrap();
    let QueryResponse::Types(types) = response else {
        panic!("expected types");
    };
    assert_eq!(types.results.len(), 1);
    assert_eq!(types.results[0].name, "AEmbarkGameMode");
    assert_eq!(types.results[0].match_reason, "prefix-variant");
}

#[tokio::test]
async fn cross_language_children_scenario() {
    let env = TestEnv::new();

    // Source chain in one project
    let mut actors = source_file("/engine/Source/Actor.h", "Engine", 1);
    actors.types = vec![
        class("AActor", None, 5),
        class("ACharacter", Some("AActor"), 50),
    ];
    env.ingest_file(actors);

    // Blueprint in another project, parent recorded un-prefixed
    env.ingestor.apply(IngestRequest {
        assets: vec![blueprint("BP_Hero", "Actor", "Game")],
        ..Default::default()
    });

    let response = env
        .query
        .dispatch(QueryRequest::FindChildren(FindChildrenArgs {
            parent: "AActor".to_string(),
            recursive: true,
            project: None,
            language: None,
            max_results: 100,
        }))
        .await
        .unwrap();

    let QueryResponse::Children(children) = response else {
        panic!("expected children");
    };
    assert!(children.parent_found);
    assert!(!children.truncated);
    let names: Vec<&str> = children.results.iter().map(|c| c.name.as_str()).collect();
    assert!(names.contains(&"ACharacter"));
    assert!(names.contains(&"BP_Hero"));

    let bp = children
        .results
        .iter()
        .find(|c| c.name == "BP_Hero")
        .unwrap();
    assert_eq!(bp.source, "asset");
    assert_eq!(bp.project, "Game");
}

#[tokio::test]
async fn fuzzy_ranking_matches_stripping_rules() {
    let env = TestEnv::new();
    let mut file = source_file("/game/Source/Actors.h", "Game", 1);
    file.types = vec![
        class("Actor", None, 1),
        class("AActor", None, 10),
        class("UActor", None, 20),
    ];
    env.ingest_file(file);

    let mut args = find_type_args("AActor");
    args.fuzzy = true;
    let response = env
        .query
        .dispatch(QueryRequest::FindType(args))
        .await
        .unwrap();
    let QueryResponse::Types(types) = response else {
        panic!();
    };
    let names: Vec<&str> = types.results.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["AActor", "Actor", "UActor"]);
    assert!(types.results[0].score > types.results[1].score);
    assert!(types.results[1].score > types.results[2].score);
}

#[tokio::test]
async fn two_char_query_uses_substring_path() {
    let env = TestEnv::new();
    let mut file = source_file("/game/Source/IO.h", "Game", 1);
    file.types = vec![class("FArchiveIO", None, 1)];
    env.ingest_file(file);

    let mut args = find_type_args("io");
    args.fuzzy = true;
    let response = env
        .query
        .dispatch(QueryRequest::FindType(args))
        .await
        .unwrap();
    let QueryResponse::Types(types) = response else {
        panic!();
    };
    assert_eq!(types.results.len(), 1);
    assert_eq!(types.results[0].name, "FArchiveIO");
}

#[tokio::test]
async fn member_context_and_signature_attachment() {
    let env = TestEnv::new();
    let mut file = source_file("/game/Source/Hero.h", "Game", 1);
    file.content =
        Some("class AHero {\npublic:\n    void Jump();\n    int Health;\n};\n".to_string());
    file.types = vec![class("AHero", None, 1)];
    file.members = vec![function("Jump", Some("AHero"), 3)];
    env.ingest_file(file);

    let response = env
        .query
        .dispatch(QueryRequest::FindMember(FindMemberArgs {
            name: "Jump".to_string(),
            fuzzy: false,
            containing_type: None,
            containing_type_hierarchy: false,
            member_kind: None,
            project: None,
            language: None,
            max_results: 10,
            context_lines: 1,
            include_signatures: true,
        }))
        .await
        .unwrap();

    let QueryResponse::Members(members) = response else {
        panic!();
    };
    let hit = &members.results[0];
    assert_eq!(hit.signature.as_deref(), Some("void Jump();"));
    let context = hit.context.as_ref().unwrap();
    assert_eq!(context.start_line, 2);
    assert_eq!(context.lines, vec!["public:", "    void Jump();", "    int Health;"]);
}

#[tokio::test]
async fn grep_multi_word_proximity_scenario() {
    let env = TestEnv::new();
    let engine = StubEngine::with_hits(vec![
        // Same line: survives
        hit("Game/Actor.h", 5, "class AActor : public UObject"),
        // Words far apart with no context linkage: dropped
        hit("Game/Far.h", 10, "class"),
    ]);
    let pipeline = env.grep_with(engine);

    let response = pipeline.run(&grep_request("class AActor")).await.unwrap();
    assert_eq!(response.total_matches, 1);
    let GrepResults::Flat(matches) = &response.results else {
        panic!();
    };
    assert_eq!(matches[0].path, "Game/Actor.h");
}

#[tokio::test]
async fn grep_engine_down_yields_not_available() {
    let env = TestEnv::new();
    let pipeline = env.grep_with(StubEngine::unavailable());
    let err = pipeline.run(&grep_request("anything")).await.unwrap_err();
    assert_eq!(err.status(), 503);
    // Failures are not cached
    assert!(env.cache.is_empty());
}

#[tokio::test]
async fn grep_ranks_definition_and_recency() {
    let env = TestEnv::new();
    // Ingest the file so the ranker can see a fresh mtime through the
    // mirror-path lookup.
    let mut file = source_file("/game/Source/Actor.h", "Game", uindex::store::now_ms());
    file.relative_path = Some("Source/Actor.h".to_string());
    file.types = vec![class("AActor", None, 5)];
    env.ingest_file(file);

    let engine = StubEngine::with_hits(vec![
        hit("Game/Other.cpp", 900, "    AActor* a;"),
        hit("Game/Source/Actor.h", 5, "class AActor : public UObject"),
    ]);
    let pipeline = env.grep_with(engine);
    let response = pipeline.run(&grep_request("AActor")).await.unwrap();

    let GrepResults::Flat(matches) = &response.results else {
        panic!();
    };
    assert_eq!(matches[0].path, "Game/Source/Actor.h");
    assert!(matches[0].score > matches[1].score);
}

#[tokio::test]
async fn memory_and_store_paths_agree_on_exact_lookup() {
    let env = TestEnv::new();
    let mut file = source_file("/game/Source/Hero.h", "Game", 1);
    file.types = vec![class("AHero", Some("AActor"), 7)];
    env.ingest_file(file);

    // Memory path
    let memory_response = env
        .query
        .dispatch(QueryRequest::FindType(find_type_args("AHero")))
        .await
        .unwrap();
    let QueryResponse::Types(memory_types) = memory_response else {
        panic!();
    };

    // Store path: a façade over an unloaded index, as during the
    // startup window, answers the same query through SQL
    let store_response = env
        .store_only_query()
        .dispatch(QueryRequest::FindType(find_type_args("AHero")))
        .await
        .unwrap();
    let QueryResponse::Types(store_types) = store_response else {
        panic!();
    };

    assert_eq!(memory_types.results.len(), store_types.results.len());
    assert_eq!(memory_types.results[0].name, store_types.results[0].name);
    assert_eq!(memory_types.results[0].line, store_types.results[0].line);
    assert_eq!(
        memory_types.results[0].parent,
        store_types.results[0].parent
    );
}

#[tokio::test]
async fn truncation_is_explicit() {
    let env = TestEnv::new();
    let mut file = source_file("/engine/Source/Zoo.h", "Engine", 1);
    file.types = vec![class("AActor", None, 1)];
    for i in 0..12 {
        file.types.push(class(&format!("AChild{i:02}"), Some("AActor"), i + 10));
    }
    env.ingest_file(file);

    let response = env
        .query
        .dispatch(QueryRequest::FindChildren(FindChildrenArgs {
            parent: "AActor".to_string(),
            recursive: false,
            project: None,
            language: None,
            max_results: 5,
        }))
        .await
        .unwrap();
    let QueryResponse::Children(children) = response else {
        panic!();
    };
    assert!(children.truncated);
    assert_eq!(children.results.len(), 5);
    assert_eq!(children.total_children, 12);
}
