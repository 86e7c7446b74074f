//! End-to-end privilege scenarios driven through the public command API.

use postgrust_acl::catalog::oid::{BOOTSTRAP_SUPERUSERID, PG_PUBLIC_NAMESPACE};
use postgrust_acl::catalog::{DefaultAclKey, DefaultAclObjectType, RelKind, TypeKind};
use postgrust_acl::commands::define::{create_relation, create_type};
use postgrust_acl::commands::extension::create_extension;
use postgrust_acl::commands::owner::{drop_owned_privileges, drop_role};
use postgrust_acl::commands::{
    exec_alter_default_privileges, exec_grant_stmt, AccessPriv, AlterDefaultPrivilegesStmt,
    GrantStmt, GrantTargets,
};
use postgrust_acl::security::acl::whole_mask;
use postgrust_acl::security::{
    AclMaskHow, AclMode, AclResult, AclRights, CreateRoleOptions, PrivilegeEvaluator,
};
use postgrust_acl::{
    AclError, Catalog, CommandResult, ObjectClass, ObjectType, Oid, RoleSpec, SessionContext,
};

struct Cluster {
    catalog: Catalog,
    alice: Oid,
    bob: Oid,
    carol: Oid,
}

fn cluster() -> Cluster {
    let mut catalog = Catalog::new_bootstrap();
    let mut role = |name: &str| {
        catalog
            .create_role(name, CreateRoleOptions::default())
            .expect("create role")
    };
    let alice = role("alice");
    let bob = role("bob");
    let carol = role("carol");
    Cluster {
        catalog,
        alice,
        bob,
        carol,
    }
}

fn privs(names: &[&str]) -> Option<Vec<AccessPriv>> {
    Some(names.iter().map(|name| AccessPriv::new(name)).collect())
}

fn run(catalog: &mut Catalog, user: Oid, stmt: &GrantStmt) -> Result<CommandResult, AclError> {
    exec_grant_stmt(catalog, &SessionContext::new(user), stmt, None)
}

fn table(catalog: &mut Catalog, owner: Oid, name: &str, columns: &[&str]) -> Oid {
    create_relation(
        catalog,
        &SessionContext::new(owner),
        name,
        RelKind::Table,
        columns,
    )
    .expect("create table")
}

fn holds(c: &Cluster, rel: Oid, role: Oid, mode: AclMode) -> bool {
    let session = SessionContext::new(role);
    let evaluator = PrivilegeEvaluator::new(&c.catalog, &session);
    evaluator
        .object_aclcheck(ObjectClass::Relation, rel, role, mode.into())
        .expect("aclcheck")
        == AclResult::Ok
}

fn can_select(c: &Cluster, rel: Oid, role: Oid) -> bool {
    holds(c, rel, role, AclMode::Select)
}

#[test]
fn revoking_a_grant_option_follows_the_chain() {
    let mut c = cluster();
    let t = table(&mut c.catalog, c.alice, "t", &["a"]);

    let to_bob = GrantStmt::grant(
        ObjectType::Table,
        GrantTargets::names(&["t"]),
        privs(&["select"]),
        vec![RoleSpec::name("bob")],
    )
    .with_grant_option();
    run(&mut c.catalog, c.alice, &to_bob).expect("alice grants bob");
    let to_carol = GrantStmt::grant(
        ObjectType::Table,
        GrantTargets::names(&["t"]),
        privs(&["select"]),
        vec![RoleSpec::name("carol")],
    );
    run(&mut c.catalog, c.bob, &to_carol).expect("bob grants carol");
    assert!(can_select(&c, t, c.carol), "carol should hold SELECT through bob");

    let revoke = GrantStmt::revoke(
        ObjectType::Table,
        GrantTargets::names(&["t"]),
        privs(&["select"]),
        vec![RoleSpec::name("bob")],
    );
    let err = run(&mut c.catalog, c.alice, &revoke).expect_err("restrict blocks the revoke");
    assert_eq!(err.to_string(), "dependent privileges exist");
    assert_eq!(err.hint(), Some("Use CASCADE to revoke them too."));
    assert!(can_select(&c, t, c.bob), "failed revoke must leave bob alone");
    assert!(can_select(&c, t, c.carol));

    run(&mut c.catalog, c.alice, &revoke.cascade()).expect("cascade revoke");
    assert!(!can_select(&c, t, c.bob));
    assert!(!can_select(&c, t, c.carol), "carol's grant goes with bob's option");
}

#[test]
fn each_lost_grant_option_cascades_on_its_own() {
    let mut c = cluster();
    let dave = c
        .catalog
        .create_role("dave", CreateRoleOptions::default())
        .expect("dave");
    let t = table(&mut c.catalog, c.alice, "t", &["a"]);

    let to_bob = GrantStmt::grant(
        ObjectType::Table,
        GrantTargets::names(&["t"]),
        privs(&["select", "update"]),
        vec![RoleSpec::name("bob")],
    )
    .with_grant_option();
    run(&mut c.catalog, c.alice, &to_bob).expect("alice grants bob");
    let to_dave = GrantStmt::grant(
        ObjectType::Table,
        GrantTargets::names(&["t"]),
        privs(&["select"]),
        vec![RoleSpec::name("dave")],
    )
    .with_grant_option();
    run(&mut c.catalog, c.alice, &to_dave).expect("alice grants dave");
    let dave_to_bob = GrantStmt::grant(
        ObjectType::Table,
        GrantTargets::names(&["t"]),
        privs(&["select"]),
        vec![RoleSpec::name("bob")],
    )
    .with_grant_option();
    run(&mut c.catalog, dave, &dave_to_bob).expect("dave grants bob");
    let to_carol = GrantStmt::grant(
        ObjectType::Table,
        GrantTargets::names(&["t"]),
        privs(&["update"]),
        vec![RoleSpec::name("carol")],
    );
    run(&mut c.catalog, c.bob, &to_carol).expect("bob grants carol");

    let revoke = GrantStmt::revoke(
        ObjectType::Table,
        GrantTargets::names(&["t"]),
        privs(&["select", "update"]),
        vec![RoleSpec::name("bob")],
    );
    let err = run(&mut c.catalog, c.alice, &revoke).expect_err("carol depends on bob's UPDATE");
    assert_eq!(err.to_string(), "dependent privileges exist");
    assert!(holds(&c, t, c.carol, AclMode::Update));

    run(&mut c.catalog, c.alice, &revoke.cascade()).expect("cascade revoke");
    assert!(!holds(&c, t, c.carol, AclMode::Update), "carol's UPDATE goes with the option");
    assert!(holds(&c, t, c.bob, AclMode::Select), "bob keeps SELECT from dave");
    assert!(!holds(&c, t, c.bob, AclMode::Update));
}

#[test]
fn failing_statement_changes_nothing() {
    let mut c = cluster();
    let t1 = table(&mut c.catalog, c.alice, "t1", &["a"]);
    table(&mut c.catalog, c.bob, "t2", &["a"]);

    let stmt = GrantStmt::grant(
        ObjectType::Table,
        GrantTargets::names(&["t1", "t2"]),
        privs(&["select"]),
        vec![RoleSpec::name("carol")],
    );
    let err = run(&mut c.catalog, c.alice, &stmt).expect_err("alice holds nothing on t2");
    assert_eq!(err.to_string(), "permission denied for table t2");
    assert_eq!(c.catalog.relation(t1).and_then(|rel| rel.acl.clone()), None);
    assert!(!c.catalog.shdepend().has_dependents(c.carol));

    let stmt = GrantStmt::grant(
        ObjectType::Table,
        GrantTargets::names(&["t1"]),
        privs(&["select", "foobar"]),
        vec![RoleSpec::name("carol")],
    );
    let err = run(&mut c.catalog, c.alice, &stmt).expect_err("unknown privilege");
    assert_eq!(err.to_string(), "unrecognized privilege type \"foobar\"");
    assert_eq!(err.sqlstate(), "42601");
    assert_eq!(c.catalog.relation(t1).and_then(|rel| rel.acl.clone()), None);
}

#[test]
fn public_cannot_receive_grant_options() {
    let mut c = cluster();
    let t = table(&mut c.catalog, c.alice, "t", &["a"]);
    let stmt = GrantStmt::grant(
        ObjectType::Table,
        GrantTargets::names(&["t"]),
        privs(&["select"]),
        vec![RoleSpec::Public],
    )
    .with_grant_option();
    let err = run(&mut c.catalog, c.alice, &stmt).expect_err("PUBLIC with grant option");
    assert_eq!(err.to_string(), "grant options can only be granted to roles");
    assert_eq!(err.sqlstate(), "0LP01");
    assert_eq!(c.catalog.relation(t).and_then(|rel| rel.acl.clone()), None);
}

#[test]
fn array_types_follow_their_element() {
    let mut c = cluster();
    let session = SessionContext::new(c.alice);
    let elem = create_type(&mut c.catalog, &session, "money2", TypeKind::Base).expect("type");
    let array = c
        .catalog
        .resolve_type(&["money2[]".to_string()], &session.search_path())
        .expect("array type");
    assert_ne!(elem, array);

    let stmt = GrantStmt::grant(
        ObjectType::Type,
        GrantTargets::names(&["money2[]"]),
        privs(&["usage"]),
        vec![RoleSpec::name("bob")],
    );
    let err = run(&mut c.catalog, c.alice, &stmt).expect_err("arrays have no ACL");
    assert_eq!(err.to_string(), "cannot set privileges of array types");

    let usage = |c: &Cluster, typ: Oid| {
        let session = SessionContext::new(c.bob);
        PrivilegeEvaluator::new(&c.catalog, &session)
            .object_aclcheck(ObjectClass::Type, typ, c.bob, AclMode::Usage.into())
            .expect("aclcheck")
    };
    assert_eq!(usage(&c, elem), AclResult::Ok);
    assert_eq!(usage(&c, array), AclResult::Ok);

    let revoke = GrantStmt::revoke(
        ObjectType::Type,
        GrantTargets::names(&["money2"]),
        privs(&["usage"]),
        vec![RoleSpec::Public],
    );
    run(&mut c.catalog, c.alice, &revoke).expect("revoke from PUBLIC");
    assert_eq!(usage(&c, elem), AclResult::NoPriv);
    assert_eq!(usage(&c, array), AclResult::NoPriv);
}

#[test]
fn table_revoke_leaves_dropped_columns_alone() {
    let mut c = cluster();
    let t = table(&mut c.catalog, c.alice, "t", &["a", "b", "c"]);
    let grant = GrantStmt::grant(
        ObjectType::Table,
        GrantTargets::names(&["t"]),
        Some(vec![AccessPriv::on_columns(Some("select"), &["a", "c"])]),
        vec![RoleSpec::name("bob")],
    );
    run(&mut c.catalog, c.alice, &grant).expect("column grant");
    let dropped = c.catalog.drop_column(t, "c").expect("drop column");

    let revoke = GrantStmt::revoke(
        ObjectType::Table,
        GrantTargets::names(&["t"]),
        privs(&["select"]),
        vec![RoleSpec::name("bob")],
    );
    run(&mut c.catalog, c.alice, &revoke).expect("table revoke");

    let rel = c.catalog.relation(t).expect("relation");
    assert_eq!(rel.column(1).and_then(|col| col.acl.clone()), None);
    assert!(
        rel.column(dropped).is_some_and(|col| col.acl.is_some()),
        "the dropped column keeps its ACL"
    );
}

#[test]
fn default_privileges_apply_to_new_tables() {
    let mut c = cluster();
    let session = SessionContext::new(c.alice);
    let stmt = AlterDefaultPrivilegesStmt::grant(
        ObjectType::Table,
        privs(&["select"]),
        vec![RoleSpec::name("bob")],
    )
    .in_schemas(&["public"]);
    for _ in 0..2 {
        exec_alter_default_privileges(&mut c.catalog, &session, &stmt).expect("alter default");
    }
    assert_eq!(c.catalog.default_acls().count(), 1);

    let t = table(&mut c.catalog, c.alice, "t", &["a"]);
    assert!(can_select(&c, t, c.bob), "bob gets SELECT from the default ACL");
    assert!(!can_select(&c, t, c.carol));

    let revoke = AlterDefaultPrivilegesStmt::revoke(
        ObjectType::Table,
        privs(&["select"]),
        vec![RoleSpec::name("bob")],
    )
    .in_schemas(&["public"]);
    exec_alter_default_privileges(&mut c.catalog, &session, &revoke).expect("revoke default");
    let key = DefaultAclKey {
        role: c.alice,
        namespace: Some(PG_PUBLIC_NAMESPACE),
        objtype: DefaultAclObjectType::Relation,
    };
    assert!(c.catalog.default_acl(&key).is_none());
    assert!(can_select(&c, t, c.bob), "existing tables keep their ACL");
}

#[test]
fn superuser_holds_everything() {
    let mut c = cluster();
    let t = table(&mut c.catalog, c.alice, "t", &["a"]);
    let session = SessionContext::new(BOOTSTRAP_SUPERUSERID);
    let evaluator = PrivilegeEvaluator::new(&c.catalog, &session);
    let mask = AclRights::with_grant_option(whole_mask(ObjectType::Table));
    let held = evaluator
        .effective_privileges(
            ObjectType::Table,
            t,
            None,
            BOOTSTRAP_SUPERUSERID,
            mask,
            AclMaskHow::All,
        )
        .expect("mask");
    assert_eq!(held, mask);
}

#[test]
fn explicit_list_narrows_silently_all_privileges_warns() {
    let mut c = cluster();
    table(&mut c.catalog, c.alice, "t", &["a"]);
    let to_bob = GrantStmt::grant(
        ObjectType::Table,
        GrantTargets::names(&["t"]),
        privs(&["select"]),
        vec![RoleSpec::name("bob")],
    )
    .with_grant_option();
    run(&mut c.catalog, c.alice, &to_bob).expect("grant");

    let listed = GrantStmt::grant(
        ObjectType::Table,
        GrantTargets::names(&["t"]),
        privs(&["select", "insert"]),
        vec![RoleSpec::name("carol")],
    );
    let result = run(&mut c.catalog, c.bob, &listed).expect("listed");
    assert!(result.notices.is_empty(), "{:?}", result.notices);

    let all = GrantStmt::grant(
        ObjectType::Table,
        GrantTargets::names(&["t"]),
        None,
        vec![RoleSpec::name("carol")],
    );
    let result = run(&mut c.catalog, c.bob, &all).expect("all");
    let messages: Vec<&str> = result.notices.messages().collect();
    assert_eq!(messages, vec!["not all privileges were granted for \"t\""]);
}

#[test]
fn extension_objects_and_dropping_a_grantee() {
    let mut c = cluster();
    let mut session = SessionContext::new(BOOTSTRAP_SUPERUSERID);
    create_extension(&mut c.catalog, &mut session, "demo", None, false, |catalog, session| {
        create_relation(catalog, session, "ext_t", RelKind::Table, &["a"])?;
        let grant = GrantStmt::grant(
            ObjectType::Table,
            GrantTargets::names(&["ext_t"]),
            privs(&["select"]),
            vec![RoleSpec::name("bob")],
        );
        exec_grant_stmt(catalog, session, &grant, None)?;
        Ok(())
    })
    .expect("create extension");
    assert_eq!(c.catalog.init_privs().count(), 1);

    let err = drop_role(&mut c.catalog, &session, "bob", false).expect_err("bob holds privileges");
    assert_eq!(
        err.to_string(),
        "role \"bob\" cannot be dropped because some objects depend on it"
    );
    assert_eq!(err.detail(), Some("privileges for table ext_t"));

    drop_owned_privileges(&mut c.catalog, &session, &[RoleSpec::name("bob")]).expect("drop owned");
    drop_role(&mut c.catalog, &session, "bob", false).expect("drop role");
    assert!(c.catalog.roles().lookup("bob").is_err());
    assert_eq!(c.catalog.init_privs().count(), 1, "initial state is not rewritten");

    let result = drop_role(&mut c.catalog, &session, "bob", true).expect("if exists");
    assert_eq!(result.notices.len(), 1);
}
