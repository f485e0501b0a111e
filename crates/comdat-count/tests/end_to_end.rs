//! End-to-end pipeline tests: walk a directory of synthetic ELF object
//! files, run them through the engine, and check the emitted report.

mod common;

use common::{build_elf64_with_groups, GroupSpec};

#[path = "../src/aggregate.rs"]
mod aggregate;
#[path = "../src/engine.rs"]
mod engine;
#[path = "../src/report.rs"]
mod report;

use engine::Engine;
use report::Report;

#[test]
fn two_groups_one_with_a_single_instance() {
    let dir = tempfile::tempdir().unwrap();

    // "foo" has two instances (sizes 1 and 3): it survives filtering.
    let foo_bytes = build_elf64_with_groups(&[GroupSpec {
        identifier: "foo",
        member_sizes: &[1],
    }]);
    let foo2_bytes = build_elf64_with_groups(&[GroupSpec {
        identifier: "foo",
        member_sizes: &[3],
    }]);
    // "bar" has a single instance: it gets filtered out of the report.
    let bar_bytes = build_elf64_with_groups(&[GroupSpec {
        identifier: "bar",
        member_sizes: &[5],
    }]);

    std::fs::write(dir.path().join("a.o"), &foo_bytes).unwrap();
    std::fs::write(dir.path().join("b.o"), &foo2_bytes).unwrap();
    std::fs::write(dir.path().join("c.o"), &bar_bytes).unwrap();

    let (walker, receiver) = scan_core::walk::queue();
    let queued = walker.queue_input(&[dir.path().to_path_buf()]).unwrap();
    assert_eq!(queued, 3);

    let engine = Engine::new();
    let progress = scan_core::progress::SilentProgress;
    let ok = scan_core::workers::drive(2, receiver, &progress, {
        let engine = engine.clone();
        move |item| engine.process_item(item)
    });
    assert!(ok);

    let digest_hex = scan_core::md5::to_hex(&engine.digests.finalize());
    let entries: Vec<_> = std::sync::Arc::try_unwrap(engine.aggregation)
        .unwrap_or_else(|_| panic!("worker pool has joined; aggregation map has a single owner"))
        .into_inner()
        .into_values()
        .collect();
    let report = Report::build(entries, digest_hex);

    assert_eq!(report.points.len(), 1);
    let point = report.points[0];
    assert_eq!(point.largest, 3);
    assert_eq!(point.instances, 2);
    assert_eq!(point.wasted, 1);
    assert_eq!(report.filtered_count, 1);

    let mut out = Vec::new();
    report.write_to(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("#> Total:4"));
    assert!(text.contains("#> Wasted:1"));
    assert!(text.contains("3 2 1"));
}

#[test]
fn single_instance_group_produces_an_empty_report() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = build_elf64_with_groups(&[GroupSpec {
        identifier: "only",
        member_sizes: &[42],
    }]);
    std::fs::write(dir.path().join("only.o"), &bytes).unwrap();

    let (walker, receiver) = scan_core::walk::queue();
    walker.queue_input(&[dir.path().to_path_buf()]).unwrap();

    let engine = Engine::new();
    let progress = scan_core::progress::SilentProgress;
    let ok = scan_core::workers::drive(1, receiver, &progress, {
        let engine = engine.clone();
        move |item| engine.process_item(item)
    });
    assert!(ok);

    let entries: Vec<_> = std::sync::Arc::try_unwrap(engine.aggregation)
        .unwrap_or_else(|_| panic!("worker pool has joined; aggregation map has a single owner"))
        .into_inner()
        .into_values()
        .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].instances, 1);

    let report = Report::build(entries, "ignored".to_string());
    assert!(report.points.is_empty());
    assert_eq!(report.filtered_count, 1);
}

#[test]
fn three_instances_of_the_same_group_accumulate_across_files() {
    let dir = tempfile::tempdir().unwrap();
    for (i, size) in [2u64, 2, 2].into_iter().enumerate() {
        let bytes = build_elf64_with_groups(&[GroupSpec {
            identifier: "shared",
            member_sizes: &[size],
        }]);
        std::fs::write(dir.path().join(format!("f{i}.o")), &bytes).unwrap();
    }

    let (walker, receiver) = scan_core::walk::queue();
    walker.queue_input(&[dir.path().to_path_buf()]).unwrap();

    let engine = Engine::new();
    let progress = scan_core::progress::SilentProgress;
    scan_core::workers::drive(1, receiver, &progress, {
        let engine = engine.clone();
        move |item| engine.process_item(item)
    });

    let entries: Vec<_> = std::sync::Arc::try_unwrap(engine.aggregation)
        .unwrap_or_else(|_| panic!("worker pool has joined; aggregation map has a single owner"))
        .into_inner()
        .into_values()
        .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].instances, 3);
    assert_eq!(entries[0].total_size, 6);
    assert_eq!(entries[0].largest, 2);
}
