use tokio_test::block_on;

use super::*;
use crate::config::{ProjectSettings, ProjectsConfig};
use crate::git::footer_lines;
use crate::providers::ObjectsProvider;
use crate::submit::Submitter;
use crate::types::{ChangeId, ChangeStatus, IntegrationStatus, SubmitOptions, SubmitType};

fn submitter_with(h: &Harness, project: &str, submit_type: SubmitType) -> Submitter {
    let mut projects = ProjectsConfig::new();
    projects.set(
        project,
        ProjectSettings {
            submit_type,
            ..ProjectSettings::default()
        },
    );
    h.submitter().with_projects(projects)
}

fn submit(h: &Harness, submitter: &Submitter, seed: &ChangeId) -> crate::types::SubmissionReport {
    block_on(submitter.submit(seed, &admin(), SubmitOptions::default())).unwrap()
}

#[test]
fn test_merge_if_necessary_fast_forwards_when_able() {
    let h = create_harness();
    h.init_project("infra", "main", &[("README.md", "hi\n")]);
    let c1 = h.create_change("infra", "main", "Add a", &[("a", "1\n")], None);
    let patch_commit = h.current_commit(&c1);

    let submitter = submitter_with(&h, "infra", SubmitType::MergeIfNecessary);
    let report = submit(&h, &submitter, &c1);

    // No synthesized commit: the branch advanced to the patch set verbatim
    assert_eq!(h.tip("infra", "main"), Some(patch_commit));
    assert_eq!(
        report.result_for(&c1).unwrap().status,
        IntegrationStatus::FastForwarded
    );
    assert_eq!(h.change(&c1).status, ChangeStatus::Merged);
}

#[test]
fn test_merge_if_necessary_synthesizes_merge_on_divergence() {
    let h = create_harness();
    let base = h.init_project("infra", "main", &[("README.md", "hi\n")]);
    let c1 = h.create_change("infra", "main", "Add a", &[("a", "1\n")], Some(base));
    let patch_commit = h.current_commit(&c1);

    // The branch moves on concurrently
    let landed = h.land_commit("infra", "main", &[("other", "o\n")], "Concurrent work");

    let submitter = submitter_with(&h, "infra", SubmitType::MergeIfNecessary);
    let report = submit(&h, &submitter, &c1);

    let tip = h.tip("infra", "main").unwrap();
    let merge = h.db.objects().commit(&tip).unwrap();
    assert_eq!(merge.parents, vec![landed, patch_commit]);
    assert_eq!(
        report.result_for(&c1).unwrap().status,
        IntegrationStatus::Merged
    );

    // Merged tree carries both sides
    let tree = h.tree_of(&tip);
    assert!(tree.get("a").is_some());
    assert!(tree.get("other").is_some());

    // The merge commit is authored by the server identity and carries the
    // review trailer
    assert_eq!(merge.author.name, "tributary");
    assert!(merge.message.starts_with("Merge \"Add a\""));
    assert!(footer_lines(&merge.message)
        .iter()
        .any(|(key, _)| key == "Reviewed-on"));
}

#[test]
fn test_merge_always_never_fast_forwards() {
    let h = create_harness();
    let base = h.init_project("infra", "main", &[("README.md", "hi\n")]);
    let c1 = h.create_change("infra", "main", "Add a", &[("a", "1\n")], Some(base.clone()));
    let patch_commit = h.current_commit(&c1);

    let submitter = submitter_with(&h, "infra", SubmitType::MergeAlways);
    let report = submit(&h, &submitter, &c1);

    let tip = h.tip("infra", "main").unwrap();
    let merge = h.db.objects().commit(&tip).unwrap();
    assert_eq!(merge.parents, vec![base, patch_commit]);
    assert_eq!(
        report.result_for(&c1).unwrap().status,
        IntegrationStatus::Merged
    );
}

#[test]
fn test_cherry_pick_preserves_author_and_stamps_committer() {
    let h = create_harness();
    let base = h.init_project("infra", "main", &[("README.md", "hi\n")]);
    let c1 = h.create_change("infra", "main", "Add a", &[("a", "1\n")], Some(base));
    h.land_commit("infra", "main", &[("other", "o\n")], "Concurrent work");

    let submitter = submitter_with(&h, "infra", SubmitType::CherryPick);
    let report = submit(&h, &submitter, &c1);

    let tip = h.tip("infra", "main").unwrap();
    let pick = h.db.objects().commit(&tip).unwrap();
    assert_eq!(pick.author.name, "uploader");
    assert_eq!(pick.committer.name, "Admin");
    assert_eq!(pick.parents.len(), 1);
    assert_eq!(
        report.result_for(&c1).unwrap().status,
        IntegrationStatus::CherryPicked
    );
    assert_eq!(
        report.result_for(&c1).unwrap().message,
        format!("Change has been successfully cherry-picked as {tip}")
    );
}

#[test]
fn test_fast_forward_only_happy_path() {
    let h = create_harness();
    h.init_project("infra", "main", &[("README.md", "hi\n")]);
    let c1 = h.create_change("infra", "main", "Add a", &[("a", "1\n")], None);
    let c2 = h.create_change(
        "infra",
        "main",
        "Add b",
        &[("b", "2\n")],
        Some(h.current_commit(&c1)),
    );

    let submitter = submitter_with(&h, "infra", SubmitType::FastForwardOnly);
    let report = submit(&h, &submitter, &c2);

    assert_eq!(h.tip("infra", "main"), Some(h.current_commit(&c2)));
    assert_eq!(report.results.len(), 2);
    assert!(report
        .results
        .iter()
        .all(|r| r.status == IntegrationStatus::FastForwarded));
}

#[test]
fn test_batch_topic_merge_collapses_into_octopus() {
    let h = create_harness();
    let base = h.init_project("infra", "main", &[("README.md", "hi\n")]);
    let c1 = h.create_change("infra", "main", "Left", &[("left", "l\n")], Some(base.clone()));
    let c2 = h.create_change("infra", "main", "Right", &[("right", "r\n")], Some(base.clone()));
    h.with_change(&c1, |c| c.topic = Some("pair".to_string()));
    h.with_change(&c2, |c| c.topic = Some("pair".to_string()));

    let mut projects = ProjectsConfig::new();
    projects.set(
        "infra",
        ProjectSettings {
            submit_type: SubmitType::MergeAlways,
            batch_topic_merges: true,
            ..ProjectSettings::default()
        },
    );
    let submitter = h.submitter().with_projects(projects);
    let report = submit(&h, &submitter, &c1);

    let tip = h.tip("infra", "main").unwrap();
    let merge = h.db.objects().commit(&tip).unwrap();
    assert_eq!(merge.parents.len(), 3);
    assert_eq!(merge.parents[0], base);
    assert!(merge.message.starts_with("Merge changes from topic \"pair\""));

    // Both changes share the one merge commit
    assert_eq!(report.result_for(&c1).unwrap().commit, Some(tip.clone()));
    assert_eq!(report.result_for(&c2).unwrap().commit, Some(tip.clone()));
    let tree = h.tree_of(&tip);
    assert!(tree.get("left").is_some());
    assert!(tree.get("right").is_some());
}

#[test]
fn test_rebase_keeps_original_author_and_message() {
    let h = create_harness();
    let base = h.init_project("infra", "main", &[("README.md", "hi\n")]);
    let c1 = h.create_change("infra", "main", "Add a", &[("a", "1\n")], Some(base));
    h.land_commit("infra", "main", &[("other", "o\n")], "Concurrent work");

    let submitter = submitter_with(&h, "infra", SubmitType::RebaseIfNecessary);
    let report = submit(&h, &submitter, &c1);

    let tip = h.tip("infra", "main").unwrap();
    let rebased = h.db.objects().commit(&tip).unwrap();
    assert_eq!(rebased.author.name, "uploader");
    assert_eq!(rebased.committer.name, "Admin");
    assert_eq!(rebased.message, "Add a");
    assert_eq!(
        report.result_for(&c1).unwrap().message,
        format!("Change has been successfully rebased and submitted as {tip}")
    );
}
