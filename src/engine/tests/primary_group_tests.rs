//! Integration tests for primary group resolution

use permweave_core::{DataType, ImmutableContextSet, Node, QueryOptions};
use permweave_engine::model::{GroupManager, GroupSource, User};
use permweave_engine::{EngineConfig, PermissionEngine, PrimaryGroupCalculation, PrimaryGroupResolver};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn config(calculation: PrimaryGroupCalculation) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.primary_group.calculation = calculation;
    config
}

fn user(groups: &Arc<GroupManager>, config: EngineConfig) -> Arc<User> {
    let source: Arc<dyn GroupSource> = groups.clone();
    let resolver = PrimaryGroupResolver::new(Arc::new(config), source);
    Arc::new(User::new(Uuid::new_v4(), None, resolver))
}

fn weighted(groups: &GroupManager, name: &str, weight: i32) {
    groups.get_or_create(name).set_weight(Some(weight));
}

#[test]
fn test_parents_by_weight_picks_heaviest() {
    let groups = Arc::new(GroupManager::new());
    weighted(&groups, "low", 1);
    weighted(&groups, "high", 10);

    let user = user(&groups, config(PrimaryGroupCalculation::ParentsByWeight));
    user.nodes().set_node(DataType::Normal, Node::inheritance("low"));
    user.nodes().set_node(DataType::Normal, Node::inheritance("high"));

    assert_eq!(user.primary_group(&QueryOptions::non_contextual()), "high");
}

#[test]
fn test_parents_by_weight_tie_keeps_first() {
    let groups = Arc::new(GroupManager::new());
    weighted(&groups, "zeta", 5);
    weighted(&groups, "alpha", 5);

    let user = user(&groups, config(PrimaryGroupCalculation::ParentsByWeight));
    user.nodes().set_node(DataType::Normal, Node::inheritance("zeta"));
    user.nodes().set_node(DataType::Normal, Node::inheritance("alpha"));

    assert_eq!(user.primary_group(&QueryOptions::non_contextual()), "zeta");
}

#[test]
fn test_parents_by_weight_ignores_grandparents() {
    let groups = Arc::new(GroupManager::new());
    weighted(&groups, "member", 1);
    weighted(&groups, "owner", 1000);
    groups
        .get_or_create("member")
        .nodes()
        .set_node(DataType::Normal, Node::inheritance("owner"));

    let direct = user(&groups, config(PrimaryGroupCalculation::ParentsByWeight));
    direct.nodes().set_node(DataType::Normal, Node::inheritance("member"));
    assert_eq!(direct.primary_group(&QueryOptions::non_contextual()), "member");
}

#[test]
fn test_all_parents_by_weight_walks_graph() {
    let groups = Arc::new(GroupManager::new());
    weighted(&groups, "b", 1);
    weighted(&groups, "a", 10);
    groups
        .get_or_create("a")
        .nodes()
        .set_node(DataType::Normal, Node::inheritance("b"));

    let user = user(&groups, config(PrimaryGroupCalculation::AllParentsByWeight));
    user.nodes().set_node(DataType::Normal, Node::inheritance("a"));
    assert_eq!(user.primary_group(&QueryOptions::non_contextual()), "a");
}

#[test]
fn test_fallbacks() {
    let groups = Arc::new(GroupManager::new());

    let user = user(&groups, config(PrimaryGroupCalculation::ParentsByWeight));
    assert_eq!(user.primary_group(&QueryOptions::non_contextual()), "default");

    user.set_stored_primary_group(Some("Admin"));
    assert_eq!(user.primary_group(&QueryOptions::non_contextual()), "admin");

    user.set_stored_primary_group(Some("   "));
    assert_eq!(user.primary_group(&QueryOptions::non_contextual()), "default");
}

#[test]
fn test_stored_ignores_parents() {
    let groups = Arc::new(GroupManager::new());
    weighted(&groups, "vip", 50);

    let mut config = config(PrimaryGroupCalculation::Stored);
    config.primary_group.default_group = "Guest".to_string();
    let user = user(&groups, config);
    user.nodes().set_node(DataType::Normal, Node::inheritance("vip"));

    assert_eq!(user.primary_group(&QueryOptions::non_contextual()), "guest");
    user.set_stored_primary_group(Some("staff"));
    assert_eq!(user.primary_group(&QueryOptions::non_contextual()), "staff");
}

#[test]
fn test_stored_is_cached_until_edit() {
    let groups = Arc::new(GroupManager::new());
    let user = user(&groups, config(PrimaryGroupCalculation::Stored));
    let options = QueryOptions::non_contextual();

    assert_eq!(user.primary_group(&options), "default");
    assert_eq!(user.primary_group_resolver().cached_len(), 1);

    user.set_stored_primary_group(Some("staff"));
    assert_eq!(user.primary_group_resolver().cached_len(), 0);
    assert_eq!(user.primary_group(&options), "staff");
}

#[test]
fn test_expired_queries_are_evicted() {
    let groups = Arc::new(GroupManager::new());
    let mut config = config(PrimaryGroupCalculation::ParentsByWeight);
    config.primary_group.cache_ttl_secs = 1;
    let user = user(&groups, config);

    let lobby = QueryOptions::contextual(ImmutableContextSet::of("server", "lobby").unwrap());
    let survival = QueryOptions::contextual(ImmutableContextSet::of("server", "survival").unwrap());
    user.primary_group(&lobby);
    user.primary_group(&survival);
    assert_eq!(user.primary_group_resolver().cached_len(), 2);

    std::thread::sleep(Duration::from_millis(1100));
    user.primary_group(&QueryOptions::non_contextual());
    assert_eq!(user.primary_group_resolver().cached_len(), 1);
}

#[test]
fn test_own_edit_invalidates_cache() {
    let groups = Arc::new(GroupManager::new());
    weighted(&groups, "low", 1);
    weighted(&groups, "high", 10);

    let user = user(&groups, config(PrimaryGroupCalculation::ParentsByWeight));
    let options = QueryOptions::non_contextual();
    user.nodes().set_node(DataType::Normal, Node::inheritance("low"));
    assert_eq!(user.primary_group(&options), "low");
    assert_eq!(user.primary_group_resolver().cached_len(), 1);

    user.nodes().set_node(DataType::Normal, Node::inheritance("high"));
    assert_eq!(user.primary_group_resolver().cached_len(), 0);
    assert_eq!(user.primary_group(&options), "high");
}

#[test]
fn test_cached_until_ttl() {
    let groups = Arc::new(GroupManager::new());
    weighted(&groups, "low", 1);
    weighted(&groups, "high", 10);

    let mut config = config(PrimaryGroupCalculation::ParentsByWeight);
    config.primary_group.cache_ttl_secs = 1;
    let user = user(&groups, config);
    let options = QueryOptions::non_contextual();
    user.nodes().set_node(DataType::Normal, Node::inheritance("low"));
    user.nodes().set_node(DataType::Normal, Node::inheritance("high"));
    assert_eq!(user.primary_group(&options), "high");

    // a group change is not an edit of the user, so the cached value stays
    groups.get_or_create("low").set_weight(Some(100));
    assert_eq!(user.primary_group(&options), "high");

    std::thread::sleep(Duration::from_millis(1100));
    assert_eq!(user.primary_group(&options), "low");
}

#[tokio::test]
async fn test_engine_invalidates_on_group_change() {
    let engine = PermissionEngine::new(EngineConfig::default()).unwrap();
    engine.load_group("low").set_weight(Some(1));
    engine.load_group("high").set_weight(Some(10));

    let uuid = Uuid::new_v4();
    let user = engine.load_user(uuid, None);
    user.nodes().set_node(DataType::Normal, Node::inheritance("low"));
    user.nodes().set_node(DataType::Normal, Node::inheritance("high"));

    let options = QueryOptions::non_contextual();
    assert_eq!(engine.primary_group(uuid, &options).unwrap(), "high");

    engine.group("low").unwrap().set_weight(Some(100));
    assert_eq!(engine.primary_group(uuid, &options).unwrap(), "low");
}
