use imagemeta_core::{AttributeField, Criteria, Metadata, MetadataAttributes};
use imagemeta_engine::EngineError;
use imagemeta_harness::{TestStore, same_contents, scenario_attrs, short_attrs};
use imagemeta_storage::Collection;

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Runs a scenario against the in-memory and the SQLite collection.
macro_rules! on_both_backends {
    ($name:ident, $body:ident) => {
        mod $name {
            use super::*;

            #[test]
            fn memory() -> TestResult {
                $body(TestStore::memory())
            }

            #[test]
            fn sqlite() -> TestResult {
                $body(TestStore::sqlite()?)
            }
        }
    };
}

fn region_attrs(stream: &str) -> MetadataAttributes {
    MetadataAttributes {
        stream: stream.into(),
        region: "region".into(),
        series: "series".into(),
        arch: "arch".into(),
        virtual_type: "virtualType".into(),
        root_storage_type: "rootStorageType".into(),
        root_storage_size: "rootStorageSize".into(),
    }
}

// ============================================================================
// Save then find
// ============================================================================

fn save_full_tuple<C: Collection>(s: TestStore<C>) -> TestResult {
    let attrs = scenario_attrs();
    s.save(&attrs, "1")?;

    let found = s.find_metadata(&attrs)?;
    assert_eq!(found, vec![Metadata::new(attrs, "1")]);
    Ok(())
}
on_both_backends!(save_full_tuple_is_findable, save_full_tuple);

fn replace_image_id<C: Collection>(s: TestStore<C>) -> TestResult {
    let attrs = short_attrs("stream");
    s.save(&attrs, "1")?;
    assert_eq!(s.find_metadata(&attrs)?, vec![Metadata::new(attrs.clone(), "1")]);

    s.save(&attrs, "12")?;
    assert_eq!(s.find_metadata(&attrs)?, vec![Metadata::new(attrs, "12")]);
    Ok(())
}
on_both_backends!(same_attrs_different_image_replaces, replace_image_id);

fn idempotent_save<C: Collection>(s: TestStore<C>) -> TestResult {
    let attrs = short_attrs("stream");
    s.save(&attrs, "1")?;
    let once = s.find_all()?;

    s.save(&attrs, "1")?;
    let twice = s.find_all()?;

    assert_eq!(once, twice);
    assert_eq!(twice, vec![Metadata::new(attrs, "1")]);
    Ok(())
}
on_both_backends!(same_attrs_same_image_is_idempotent, idempotent_save);

// ============================================================================
// Query semantics
// ============================================================================

fn not_found_contract<C: Collection>(s: TestStore<C>) -> TestResult {
    // Nothing stored yet: every query is NotFound, including the wildcard.
    let err = s.find_all().unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "matching cloud image metadata not found");
    assert!(s.find_metadata(&scenario_attrs()).unwrap_err().is_not_found());

    s.save(&region_attrs("stream"), "1")?;

    let err = s
        .find_metadata(&MetadataAttributes::default().with(AttributeField::Stream, "something else"))
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
    assert_eq!(err.to_string(), "matching cloud image metadata not found");
    Ok(())
}
on_both_backends!(find_reports_not_found, not_found_contract);

fn partial_match<C: Collection>(s: TestStore<C>) -> TestResult {
    let attrs = scenario_attrs();
    s.save(&attrs, "1")?;

    let by_region = s.find_metadata(&MetadataAttributes::default().with(AttributeField::Region, "region-test"))?;
    assert_eq!(by_region, vec![Metadata::new(attrs.clone(), "1")]);

    let by_two = s.find_metadata(
        &MetadataAttributes::default()
            .with(AttributeField::Arch, "arch")
            .with(AttributeField::VirtualType, "virtType-test"),
    )?;
    assert_eq!(by_two.len(), 1);

    let unrelated = s.find_metadata(&MetadataAttributes::default().with(AttributeField::Stream, "daily"));
    assert!(unrelated.unwrap_err().is_not_found());
    Ok(())
}
on_both_backends!(partial_criteria_match, partial_match);

fn shared_region<C: Collection>(s: TestStore<C>) -> TestResult {
    let first = region_attrs("stream");
    let second = region_attrs("another_stream");

    assert!(s.find_metadata(&first).unwrap_err().is_not_found());

    s.save(&first, "1")?;
    assert_eq!(s.find_metadata(&first)?, vec![Metadata::new(first.clone(), "1")]);

    s.save(&second, "2")?;
    let found = s.find_metadata(&MetadataAttributes::default().with(AttributeField::Region, "region"))?;
    assert!(same_contents(
        found,
        vec![Metadata::new(first, "1"), Metadata::new(second, "2")]
    ));
    Ok(())
}
on_both_backends!(find_by_shared_region_returns_both, shared_region);

fn empty_string_asymmetry<C: Collection>(s: TestStore<C>) -> TestResult {
    // In a save, "" is a literal: these two tuples are distinct records.
    let blank = short_attrs("stream");
    let set = short_attrs("stream").with(AttributeField::Region, "region");
    s.save(&blank, "blank")?;
    s.save(&set, "set")?;
    assert_eq!(s.find_all()?.len(), 2);

    // In a query, "" is a wildcard: the blank-region query sees both.
    let found = s.find_metadata(&blank)?;
    assert!(same_contents(
        found,
        vec![Metadata::new(blank.clone(), "blank"), Metadata::new(set, "set")]
    ));

    // An explicit literal-empty filter sees only the blank one.
    let literal = s.find_matching(
        Criteria::from_attributes(&blank).with(AttributeField::Region, ""),
    )?;
    assert_eq!(literal, vec![Metadata::new(blank, "blank")]);
    Ok(())
}
on_both_backends!(empty_string_is_literal_in_save_wildcard_in_find, empty_string_asymmetry);

// ============================================================================
// Uniqueness across many saves
// ============================================================================

fn last_write_wins_per_key<C: Collection>(s: TestStore<C>) -> TestResult {
    let keys = ["a", "b", "c"];
    let mut last = std::collections::BTreeMap::new();
    for round in 0..4 {
        for (i, stream) in keys.iter().enumerate() {
            if (round + i) % 2 == 0 || round == 3 {
                let image_id = format!("{stream}-{round}");
                s.save(&short_attrs(stream), &image_id)?;
                last.insert(*stream, image_id);
            }
        }
    }

    let all = s.find_all()?;
    assert_eq!(all.len(), keys.len());
    for m in all {
        assert_eq!(last[m.attributes.stream.as_str()], m.image_id);
    }
    Ok(())
}
on_both_backends!(one_record_per_tuple, last_write_wins_per_key);

#[test]
fn on_disk_store_survives_reopen() -> TestResult {
    let s = TestStore::sqlite_on_disk()?;
    s.save(&scenario_attrs(), "ami-1")?;
    s.save(&short_attrs("daily"), "ami-2")?;

    let reopened = s.reopen()?;
    assert_eq!(
        reopened.find_metadata(&scenario_attrs())?,
        vec![Metadata::new(scenario_attrs(), "ami-1")]
    );
    assert_eq!(reopened.find_metadata(&MetadataAttributes::default())?.len(), 2);

    // Writes through the new connection are visible to the old one.
    reopened.save_metadata(&Metadata::new(scenario_attrs(), "ami-3"))?;
    assert_eq!(
        s.find_metadata(&scenario_attrs())?,
        vec![Metadata::new(scenario_attrs(), "ami-3")]
    );
    Ok(())
}

#[test]
fn in_memory_store_cannot_be_reopened() {
    let s = TestStore::sqlite().expect("in-memory sqlite");
    assert!(s.reopen().is_err());
}
