use crate::memory::{MemoryRoom, MemoryRooms, MemoryTimeline};
use crate::*;

use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};

#[derive(Clone, Copy, Debug)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        // Deterministic, dependency-free PRNG for tests.
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    fn gen_range_usize(&mut self, start: usize, end_exclusive: usize) -> usize {
        debug_assert!(start < end_exclusive);
        start + (self.next_u64() % (end_exclusive - start) as u64) as usize
    }
}

const ME: &str = "@me:example.org";
const BOB: &str = "@bob:example.org";
const ROOM: &str = "!room:example.org";

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, hour, 0, 0).unwrap()
}

fn msg(id: &str, sender: &str, body: &str) -> Event {
    Event::new(id, sender, Payload::Message(MessageContent::text(body))).with_timestamp(at(12))
}

fn member(
    id: &str,
    sender: &str,
    user: &str,
    membership: Membership,
    prev: Option<Membership>,
) -> Event {
    let change = MemberChange {
        user_id: user.to_string(),
        membership: Some(membership),
        prev: prev.map(|m| MemberState {
            membership: Some(m),
            ..MemberState::default()
        }),
        ..MemberChange::default()
    };
    Event::new(id, sender, Payload::Member(change)).with_timestamp(at(12))
}

fn rename(id: &str, user: &str, from: &str, to: &str) -> Event {
    let change = MemberChange {
        user_id: user.to_string(),
        membership: Some(Membership::Join),
        display_name: Some(to.to_string()),
        prev: Some(MemberState {
            membership: Some(Membership::Join),
            display_name: Some(from.to_string()),
            avatar_url: None,
        }),
        ..MemberChange::default()
    };
    Event::new(id, user, Payload::Member(change)).with_timestamp(at(12))
}

fn attached(events: Vec<Event>) -> (MemoryTimeline, TimelineProjection, ChangeRecorder<TimelineField>) {
    let tl = MemoryTimeline::new(ROOM, ME).with_events(events);
    let mut proj = TimelineProjection::new(TimelineOptions::default());
    let rec = ChangeRecorder::new();
    proj.subscribe(rec.listener());
    proj.set_source(Some(&tl));
    rec.take();
    (tl, proj, rec)
}

fn numbered(n: usize, sender: &str) -> Vec<Event> {
    (0..n)
        .map(|i| msg(&alloc::format!("${i}"), sender, "x"))
        .collect()
}

fn structural(changes: &[ModelChange<TimelineField>]) -> Vec<ModelChange<TimelineField>> {
    changes
        .iter()
        .filter(|c| !matches!(c, ModelChange::ContentChanged { .. }))
        .cloned()
        .collect()
}

fn text(v: Option<TimelineValue>) -> String {
    match v {
        Some(TimelineValue::Text(s)) => s,
        other => panic!("expected text, got {other:?}"),
    }
}

#[test]
fn row_space_maps_segments_both_ways() {
    let space = RowSpace::new(3, 5);
    assert_eq!(space.len(), 8);
    assert_eq!(space.to_row(Segment::Pending, 0), Some(2));
    assert_eq!(space.to_row(Segment::Pending, 2), Some(0));
    assert_eq!(space.to_row(Segment::Pending, 3), None);
    assert_eq!(space.to_row(Segment::Committed, 0), Some(3));
    assert_eq!(space.to_row(Segment::Committed, 4), Some(7));
    assert_eq!(space.to_row(Segment::Committed, 5), None);

    assert_eq!(space.from_row(0), Some((Segment::Pending, 2)));
    assert_eq!(space.from_row(2), Some((Segment::Pending, 0)));
    assert_eq!(space.from_row(3), Some((Segment::Committed, 0)));
    assert_eq!(space.from_row(7), Some((Segment::Committed, 4)));
    assert_eq!(space.from_row(8), None);

    let empty = RowSpace::default();
    assert!(empty.is_empty());
    assert_eq!(empty.from_row(0), None);
}

#[test]
fn detached_projection_has_no_rows() {
    let tl = MemoryTimeline::new(ROOM, ME).with_events(numbered(3, BOB));
    let proj = TimelineProjection::default();
    assert_eq!(proj.row_count(&tl), 0);
    assert!(proj.row(&tl, 0).is_none());
}

#[test]
fn attach_and_detach_announce_resets() {
    let tl = MemoryTimeline::new(ROOM, ME).with_events(numbered(3, BOB));
    let mut proj = TimelineProjection::default();
    let rec = ChangeRecorder::new();
    proj.subscribe(rec.listener());

    proj.set_source(Some(&tl));
    assert_eq!(
        rec.take(),
        vec![
            ModelChange::AboutTo(StructuralChange::Reset),
            ModelChange::Done {
                change: StructuralChange::Reset,
                row_count: 3
            },
        ]
    );

    // Same source again is a no-op.
    proj.set_source(Some(&tl));
    assert!(rec.is_empty());

    proj.set_source::<MemoryTimeline>(None);
    assert_eq!(
        rec.take().last(),
        Some(&ModelChange::Done {
            change: StructuralChange::Reset,
            row_count: 0
        })
    );
    assert_eq!(proj.room_id(), None);
}

#[test]
fn new_messages_insert_at_pending_boundary() {
    let (mut tl, mut proj, rec) = attached(numbered(2, BOB));
    tl.add_pending(&mut proj, msg("", ME, "draft"), at(13));
    rec.take();

    tl.add_new_messages(&mut proj, vec![msg("$a", BOB, "a"), msg("$b", BOB, "b")]);
    assert_eq!(
        structural(&rec.take()),
        vec![
            ModelChange::AboutTo(StructuralChange::Insert { first: 1, last: 2 }),
            ModelChange::Done {
                change: StructuralChange::Insert { first: 1, last: 2 },
                row_count: 5
            },
        ]
    );
    assert_eq!(text(proj.data(&tl, 1, TimelineField::EventId)), "$b");
    assert_eq!(text(proj.data(&tl, 2, TimelineField::EventId)), "$a");
}

#[test]
fn same_sender_refresh_is_bounded_by_the_scan_window() {
    let (mut tl, mut proj, rec) = attached(numbered(300, BOB));
    tl.add_new_messages(&mut proj, vec![msg("$new", BOB, "y")]);

    let rows: Vec<usize> = rec
        .take()
        .into_iter()
        .filter_map(|c| match c {
            ModelChange::ContentChanged { first, .. } => Some(first),
            _ => None,
        })
        .collect();
    assert_eq!(rows.len(), DEFAULT_SCAN_WINDOW);
    assert_eq!(rows.iter().max(), Some(&(DEFAULT_SCAN_WINDOW - 1)));
}

#[test]
fn historical_backfill_appends_rows_and_refreshes_previous_last_row() {
    let (mut tl, mut proj, rec) = attached(numbered(3, BOB));
    tl.add_historical_messages(&mut proj, vec![msg("$old0", ME, "o"), msg("$old1", ME, "p")]);

    let changes = rec.take();
    assert_eq!(
        structural(&changes),
        vec![
            ModelChange::AboutTo(StructuralChange::Insert { first: 3, last: 4 }),
            ModelChange::Done {
                change: StructuralChange::Insert { first: 3, last: 4 },
                row_count: 5
            },
        ]
    );
    let above_refreshes: Vec<_> = changes
        .iter()
        .filter(|c| {
            matches!(
                c,
                ModelChange::ContentChanged { fields: Fields::Only(f), .. }
                    if f.as_slice() == TimelineField::ABOVE
            )
        })
        .collect();
    assert_eq!(
        above_refreshes,
        vec![&ModelChange::ContentChanged {
            first: 2,
            last: 2,
            fields: Fields::Only(TimelineField::ABOVE.to_vec())
        }]
    );
    assert_eq!(text(proj.data(&tl, 4, TimelineField::EventId)), "$old0");
}

#[test]
fn merge_at_offset_zero_does_not_move_rows() {
    let (mut tl, mut proj, rec) = attached(numbered(3, BOB));
    let txn = tl.add_pending(&mut proj, msg("", ME, "hello"), at(13));
    assert_eq!(text(proj.data(&tl, 0, TimelineField::EventId)), txn);
    rec.take();

    tl.merge_pending(&mut proj, 0, "$p");

    assert!(structural(&rec.take()).is_empty());
    assert_eq!(tl.pending_count(), 0);
    assert_eq!(tl.timeline_size(), 4);
    assert_eq!(proj.row_count(&tl), 4);
    assert_eq!(text(proj.data(&tl, 0, TimelineField::Message)), "hello");
    assert_eq!(text(proj.data(&tl, 0, TimelineField::EventId)), "$p");
    assert_eq!(text(proj.data(&tl, 1, TimelineField::EventId)), "$2");
}

#[test]
fn merge_at_offset_moves_the_row_once() {
    let (mut tl, mut proj, rec) = attached(numbered(1, BOB));
    let a = tl.add_pending(&mut proj, msg("", ME, "a"), at(13));
    let _b = tl.add_pending(&mut proj, msg("", ME, "b"), at(13));
    let c = tl.add_pending(&mut proj, msg("", ME, "c"), at(13));
    rec.take();

    tl.merge_pending(&mut proj, 1, "$b");

    let moved = StructuralChange::Move {
        first: 1,
        last: 1,
        destination: 3,
    };
    assert_eq!(
        structural(&rec.take()),
        vec![
            ModelChange::AboutTo(moved),
            ModelChange::Done {
                change: moved,
                row_count: 4
            },
        ]
    );
    assert_eq!(text(proj.data(&tl, 0, TimelineField::EventId)), c);
    assert_eq!(text(proj.data(&tl, 1, TimelineField::EventId)), a);
    assert_eq!(text(proj.data(&tl, 2, TimelineField::EventId)), "$b");
    assert_eq!(text(proj.data(&tl, 3, TimelineField::EventId)), "$0");
}

#[test]
fn discarding_a_pending_event_removes_its_row() {
    let (mut tl, mut proj, rec) = attached(numbered(2, BOB));
    tl.add_pending(&mut proj, msg("", ME, "a"), at(13));
    let b = tl.add_pending(&mut proj, msg("", ME, "b"), at(13));
    rec.take();

    // Oldest pending event sits right above the committed timeline.
    tl.discard_pending(&mut proj, 0);
    assert_eq!(
        structural(&rec.take()),
        vec![
            ModelChange::AboutTo(StructuralChange::Remove { first: 1, last: 1 }),
            ModelChange::Done {
                change: StructuralChange::Remove { first: 1, last: 1 },
                row_count: 3
            },
        ]
    );
    assert_eq!(text(proj.data(&tl, 0, TimelineField::EventId)), b);
}

#[test]
fn pending_rows_report_delivery_status_and_annotation() {
    let (mut tl, mut proj, rec) = attached(numbered(1, BOB));
    tl.add_pending(&mut proj, msg("", ME, "a"), at(13));
    rec.take();

    tl.set_pending_status(&mut proj, 0, DeliveryStatus::SendingFailed);
    assert_eq!(
        rec.take(),
        vec![ModelChange::ContentChanged {
            first: 0,
            last: 0,
            fields: Fields::All
        }]
    );
    assert_eq!(
        proj.status(&tl, 0),
        Some(EventStatus::Pending(DeliveryStatus::SendingFailed))
    );
    assert_eq!(text(proj.data(&tl, 0, TimelineField::Annotation)), "");
    assert_eq!(text(proj.data(&tl, 0, TimelineField::Author)), ME);
    assert_eq!(proj.data(&tl, 1, TimelineField::Annotation), None);
}

#[test]
fn read_marker_move_refreshes_both_rows() {
    let (mut tl, mut proj, rec) = attached(numbered(3, BOB));
    let marker = || Fields::Only(vec![TimelineField::ReadMarker]);

    tl.move_read_marker(&mut proj, "$0");
    assert_eq!(
        rec.take(),
        vec![ModelChange::ContentChanged {
            first: 2,
            last: 2,
            fields: marker()
        }]
    );

    tl.move_read_marker(&mut proj, "$2");
    assert_eq!(
        rec.take(),
        vec![
            ModelChange::ContentChanged {
                first: 2,
                last: 2,
                fields: marker()
            },
            ModelChange::ContentChanged {
                first: 0,
                last: 0,
                fields: marker()
            },
        ]
    );
    assert_eq!(
        proj.data(&tl, 0, TimelineField::ReadMarker),
        Some(TimelineValue::Flag(true))
    );
    assert_eq!(
        proj.data(&tl, 2, TimelineField::ReadMarker),
        Some(TimelineValue::Flag(false))
    );

    // An unknown event is a warning, not an error.
    tl.move_read_marker(&mut proj, "$missing");
    assert_eq!(rec.take().len(), 1);
}

#[test]
fn user_markers_exclude_the_local_user() {
    let (mut tl, mut proj, rec) = attached(numbered(2, BOB));
    tl.move_user_marker(&mut proj, BOB, "$1");
    tl.move_user_marker(&mut proj, ME, "$1");
    rec.take();

    assert_eq!(
        proj.data(&tl, 0, TimelineField::UserMarkers),
        Some(TimelineValue::Users(vec![BOB.to_string()]))
    );

    tl.move_user_marker(&mut proj, BOB, "$0");
    assert_eq!(
        rec.take(),
        vec![
            ModelChange::ContentChanged {
                first: 0,
                last: 0,
                fields: Fields::Only(vec![TimelineField::UserMarkers])
            },
            ModelChange::ContentChanged {
                first: 1,
                last: 1,
                fields: Fields::Only(vec![TimelineField::UserMarkers])
            },
        ]
    );
}

#[test]
fn reattaching_another_source_for_the_same_room_resets() {
    let first = MemoryTimeline::new(ROOM, ME).with_events(numbered(3, BOB));
    let second = MemoryTimeline::new(ROOM, ME).with_events(numbered(5, BOB));
    let mut proj = TimelineProjection::default();
    let rec = ChangeRecorder::new();
    proj.subscribe(rec.listener());
    proj.set_source(Some(&first));
    rec.take();

    proj.set_source(Some(&second));
    assert_eq!(
        rec.take(),
        vec![
            ModelChange::AboutTo(StructuralChange::Reset),
            ModelChange::Done {
                change: StructuralChange::Reset,
                row_count: 5
            },
        ]
    );
    assert_eq!(proj.row_count(&second), 5);
}

#[test]
fn live_append_refreshes_the_oldest_pending_row() {
    let (mut tl, mut proj, rec) = attached(numbered(2, BOB));
    tl.add_pending(&mut proj, msg("", ME, "draft"), at(13));
    rec.take();

    tl.add_new_messages(&mut proj, vec![msg("$a", "@carol:x", "a")]);

    assert!(rec.take().contains(&ModelChange::ContentChanged {
        first: 0,
        last: 0,
        fields: Fields::Only(TimelineField::ABOVE.to_vec())
    }));
    assert_eq!(text(proj.data(&tl, 0, TimelineField::AboveAuthor)), "@carol:x");
}

#[test]
fn discarding_refreshes_the_row_above_the_gap() {
    let (mut tl, mut proj, rec) = attached(numbered(1, BOB));
    let a = tl.add_pending(&mut proj, msg("", ME, "a"), at(13));
    tl.add_pending(&mut proj, msg("", ME, "b"), at(13));
    tl.add_pending(&mut proj, msg("", ME, "c"), at(13));
    rec.take();

    // Rows: c, b, a, $0. Dropping b leaves c directly on top of a.
    tl.discard_pending(&mut proj, 1);

    assert!(rec.take().contains(&ModelChange::ContentChanged {
        first: 0,
        last: 0,
        fields: Fields::Only(TimelineField::ABOVE.to_vec())
    }));
    assert_eq!(proj.row_above(&tl, 0), Some(1));
    assert_eq!(text(proj.data(&tl, 1, TimelineField::EventId)), a);
}

#[test]
fn highlight_flag_marks_only_highlighted_events() {
    let (mut tl, mut proj, _rec) = attached(numbered(3, BOB));
    tl.set_highlighted("$1");
    tl.add_pending(&mut proj, msg("", ME, "p"), at(13));

    // Rows: pending, $2, $1, $0.
    assert_eq!(
        proj.data(&tl, 2, TimelineField::Highlight),
        Some(TimelineValue::Flag(true))
    );
    for row in [0, 1, 3] {
        assert_eq!(
            proj.data(&tl, row, TimelineField::Highlight),
            Some(TimelineValue::Flag(false)),
            "row {row}"
        );
    }
}

#[test]
fn unknown_event_ids_are_ignored() {
    let (mut tl, mut proj, rec) = attached(numbered(2, BOB));

    tl.replace_event(&mut proj, msg("$missing", BOB, "edited"));
    proj.replaced_event(&tl, "$missing");
    proj.file_transfer_changed(&tl, "$missing");
    tl.move_user_marker(&mut proj, BOB, "$missing");

    assert!(rec.is_empty());
    assert_eq!(proj.row_count(&tl), 2);
}

#[test]
fn plain_joins_leaves_and_redaction_events_are_hidden() {
    let events = vec![
        member("$j", BOB, BOB, Membership::Join, None),
        msg("$m", BOB, "hi"),
        Event::new(
            "$r",
            BOB,
            Payload::Redaction {
                redacts: "$x".to_string(),
                reason: None,
            },
        ),
        member("$l", BOB, BOB, Membership::Leave, Some(Membership::Join)),
        Event::new("$t", BOB, Payload::RoomTopic { topic: "t".to_string() }).with_repeated_state(),
    ];
    let (tl, proj, _rec) = attached(events);

    assert_eq!(proj.status(&tl, 0), Some(EventStatus::Hidden));
    assert_eq!(proj.status(&tl, 1), Some(EventStatus::Hidden));
    assert_eq!(proj.status(&tl, 2), Some(EventStatus::Hidden));
    assert_eq!(proj.status(&tl, 3), Some(EventStatus::Normal));
    assert_eq!(proj.status(&tl, 4), Some(EventStatus::Hidden));
}

#[test]
fn local_activity_bracketed_by_join_and_leave_is_hidden() {
    let events = vec![
        member("$j", ME, ME, Membership::Join, None),
        rename("$n", ME, "me", "Me"),
        member("$l", ME, ME, Membership::Leave, Some(Membership::Join)),
    ];
    let (tl, proj, _rec) = attached(events);
    assert_eq!(proj.status(&tl, 1), Some(EventStatus::Hidden));

    let events = vec![
        member("$j", ME, ME, Membership::Join, None),
        rename("$n", ME, "me", "Me"),
        msg("$m", ME, "something notable"),
        member("$l", ME, ME, Membership::Leave, Some(Membership::Join)),
    ];
    let (tl, proj, _rec) = attached(events);
    assert_eq!(proj.status(&tl, 2), Some(EventStatus::Normal));

    // No bracket in sight: assume notable.
    let (tl, proj, _rec) = attached(vec![rename("$n", ME, "me", "Me")]);
    assert_eq!(proj.status(&tl, 0), Some(EventStatus::Normal));

    // Someone else's rename is never scanned.
    let events = vec![
        member("$j", BOB, BOB, Membership::Join, None),
        rename("$n", BOB, "bob", "Bob"),
        member("$l", BOB, BOB, Membership::Leave, Some(Membership::Join)),
    ];
    let (tl, proj, _rec) = attached(events);
    assert_eq!(proj.status(&tl, 1), Some(EventStatus::Normal));
}

#[test]
fn redacted_rows_are_redacted_unless_local_activity_is_not_notable() {
    let redaction = RedactionInfo {
        redaction_id: "$red".to_string(),
        reason: Some("spam".to_string()),
    };
    let events = vec![
        msg("$a", BOB, "a").redacted(redaction.clone()),
        msg("$b", ME, "b"),
    ];
    let (tl, proj, _rec) = attached(events);
    assert_eq!(proj.status(&tl, 1), Some(EventStatus::Redacted));
    assert_eq!(text(proj.data(&tl, 1, TimelineField::Display)), "Redacted: spam");
    assert_eq!(text(proj.data(&tl, 1, TimelineField::Content)), "Redacted: spam");

    let events = vec![
        member("$j", ME, ME, Membership::Join, None),
        msg("$m", ME, "oops").redacted(redaction),
    ];
    let (tl, proj, _rec) = attached(events);
    assert_eq!(proj.status(&tl, 0), Some(EventStatus::Hidden));
}

#[test]
fn status_is_idempotent() {
    let events = vec![
        member("$j", ME, ME, Membership::Join, None),
        rename("$n", ME, "me", "Me"),
        member("$l", ME, ME, Membership::Leave, Some(Membership::Join)),
    ];
    let (tl, proj, _rec) = attached(events);
    for row in 0..proj.row_count(&tl) {
        assert_eq!(proj.status(&tl, row), proj.status(&tl, row));
    }
}

#[test]
fn redaction_triggers_a_row_and_neighbour_refresh() {
    let (mut tl, mut proj, rec) = attached(numbered(3, BOB));
    tl.redact(
        &mut proj,
        "$1",
        RedactionInfo {
            redaction_id: "$red".to_string(),
            reason: None,
        },
    );
    let changes = rec.take();
    assert_eq!(
        changes.first(),
        Some(&ModelChange::ContentChanged {
            first: 1,
            last: 1,
            fields: Fields::All
        })
    );
    // Same-sender neighbours follow.
    assert_eq!(changes.len(), 4);
    assert_eq!(proj.status(&tl, 1), Some(EventStatus::Redacted));
}

#[test]
fn row_above_skips_hidden_rows() {
    let events = vec![
        msg("$first", BOB, "a"),
        member("$j", ME, ME, Membership::Join, None),
        msg("$last", ME, "b"),
    ];
    let (tl, proj, _rec) = attached(events);

    assert_eq!(proj.row_above(&tl, 0), Some(2));
    assert_eq!(text(proj.data(&tl, 0, TimelineField::AboveAuthor)), BOB);
    assert_eq!(
        proj.data(&tl, 0, TimelineField::AboveEventType),
        Some(TimelineValue::Type(EventTypeTag::Message))
    );
    assert_eq!(proj.row_above(&tl, 2), None);
    assert_eq!(proj.data(&tl, 2, TimelineField::AboveAuthor), None);
}

#[test]
fn row_above_is_none_when_everything_above_is_hidden() {
    let events = vec![
        member("$j1", BOB, BOB, Membership::Join, None),
        member("$j2", ME, ME, Membership::Join, None),
        msg("$m", ME, "b"),
    ];
    let (tl, proj, _rec) = attached(events);
    assert_eq!(proj.row_above(&tl, 0), None);
}

#[test]
fn missing_timestamps_borrow_the_nearest_valid_date_at_midnight() {
    let valid = Local
        .with_ymd_and_hms(2024, 3, 10, 15, 30, 0)
        .unwrap()
        .with_timezone(&Utc);
    let mut older = msg("$older", BOB, "a");
    older.timestamp = None;
    let mut newer = msg("$newer", BOB, "c");
    newer.timestamp = None;
    let events = vec![older, msg("$valid", BOB, "b").with_timestamp(valid), newer];
    let (tl, proj, _rec) = attached(events);

    let expected_date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
    for row in [0, 2] {
        let Some(TimelineValue::Time(Some(ts))) = proj.data(&tl, row, TimelineField::Time) else {
            panic!("row {row} has no time");
        };
        assert_eq!(ts.date_naive(), expected_date);
        assert_eq!(ts.time(), NaiveTime::MIN);
    }
    let Some(TimelineValue::Time(Some(ts))) = proj.data(&tl, 1, TimelineField::Time) else {
        panic!("row 1 has no time");
    };
    assert_eq!(ts.with_timezone(&Utc), valid);
}

#[test]
fn no_valid_timestamp_anywhere_falls_back_to_none() {
    let mut only = msg("$a", BOB, "a");
    only.timestamp = None;
    let (tl, proj, _rec) = attached(vec![only]);
    assert_eq!(
        proj.data(&tl, 0, TimelineField::Time),
        Some(TimelineValue::Time(None))
    );
    assert_eq!(text(proj.data(&tl, 0, TimelineField::Section)), "");
}

#[test]
fn section_labels_are_relative_to_today() {
    let now = Local.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
    let day = |d: u32| Some(Local.with_ymd_and_hms(2024, 3, d, 9, 0, 0).unwrap());

    assert_eq!(evaluator::section_label(day(10), now), "Today");
    assert_eq!(evaluator::section_label(day(9), now), "Yesterday");
    assert_eq!(
        evaluator::section_label(day(8), now),
        "The day before yesterday"
    );
    assert_eq!(evaluator::section_label(day(6), now), "Wednesday");
    let long_ago = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    assert_eq!(
        evaluator::section_label(day(1), now),
        long_ago.format("%x").to_string()
    );
    assert_eq!(evaluator::section_label(day(1), now), "03/01/24");
    assert_eq!(evaluator::section_label(None, now), "");
}

#[test]
fn section_field_uses_the_configured_clock() {
    let now = Local.with_ymd_and_hms(2024, 3, 11, 8, 0, 0).unwrap();
    let tl = MemoryTimeline::new(ROOM, ME).with_events(vec![
        msg("$a", BOB, "a").with_timestamp(Local.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap().with_timezone(&Utc)),
    ]);
    let mut proj = TimelineProjection::new(TimelineOptions::new().with_clock(move || now));
    proj.set_source(Some(&tl));
    assert_eq!(text(proj.data(&tl, 0, TimelineField::Section)), "Yesterday");
}

#[test]
fn type_tags_and_content_types() {
    let image = Event::new(
        "$i",
        BOB,
        Payload::Message(MessageContent::file(
            MessageKind::Image,
            "cat.png",
            FileInfo {
                original_name: "cat.png".to_string(),
                mime_type: "image/png".to_string(),
                ..FileInfo::default()
            },
        )),
    );
    let video = Event::new(
        "$v",
        BOB,
        Payload::Message(MessageContent::file(MessageKind::Video, "", FileInfo::default())),
    );
    assert_eq!(EventTypeTag::of(&image), EventTypeTag::Image);
    assert_eq!(EventTypeTag::of(&video), EventTypeTag::File);
    assert_eq!(EventTypeTag::of(&msg("$m", BOB, "x")), EventTypeTag::Message);
    assert_eq!(
        EventTypeTag::of(&member("$j", BOB, BOB, Membership::Join, None)),
        EventTypeTag::State
    );
    assert_eq!(
        EventTypeTag::of(&Event::new("$o", BOB, Payload::Other { event_type: "x.y".to_string() })),
        EventTypeTag::Other
    );
    assert_eq!(EventTypeTag::Notice.as_str(), "notice");

    assert_eq!(evaluator::content_type(&msg("$m", BOB, "x")), "text/html");
    assert_eq!(evaluator::content_type(&image), "image/png");
    assert_eq!(
        evaluator::content_type(&member("$j", BOB, BOB, Membership::Join, None)),
        "text/plain"
    );
}

#[test]
fn file_transfer_progress_is_reported_for_file_rows() {
    let file = Event::new(
        "$f",
        BOB,
        Payload::Message(MessageContent::file(
            MessageKind::File,
            "report.pdf",
            FileInfo::default(),
        )),
    )
    .with_timestamp(at(10));
    let (mut tl, mut proj, rec) = attached(vec![file, msg("$m", BOB, "x")]);
    let info = FileTransferInfo {
        status: TransferStatus::Started,
        progress: 10,
        total: 100,
    };
    tl.set_file_transfer(&mut proj, "$f", info);
    assert_eq!(
        rec.take(),
        vec![ModelChange::ContentChanged {
            first: 1,
            last: 1,
            fields: Fields::All
        }]
    );
    assert_eq!(
        proj.data(&tl, 1, TimelineField::Progress),
        Some(TimelineValue::Progress(info))
    );
    assert_eq!(proj.data(&tl, 0, TimelineField::Progress), None);
    assert_eq!(text(proj.data(&tl, 1, TimelineField::ResolvedType)), "m.room.message");
}

#[test]
fn display_text_covers_membership_changes() {
    let mut tl = MemoryTimeline::new(ROOM, ME);
    tl.set_member_name(BOB, "Bob");

    let show = |e: &Event| render::display_text(e, &tl);
    assert_eq!(
        show(&member("$1", BOB, BOB, Membership::Join, None)),
        "joined the room"
    );
    assert_eq!(
        show(&member("$2", ME, BOB, Membership::Invite, None)),
        "invited Bob to the room"
    );
    assert_eq!(
        show(&member("$3", ME, BOB, Membership::Invite, Some(Membership::Invite)).with_repeated_state()),
        "reinvited Bob to the room"
    );
    assert_eq!(
        show(&member("$4", BOB, BOB, Membership::Leave, Some(Membership::Join))),
        "left the room"
    );
    assert_eq!(
        show(&member("$5", ME, BOB, Membership::Leave, Some(Membership::Join))),
        "has kicked Bob from the room"
    );
    assert_eq!(
        show(&member("$6", ME, BOB, Membership::Leave, Some(Membership::Ban))),
        "unbanned Bob"
    );
    assert_eq!(
        show(&member("$7", ME, BOB, Membership::Ban, Some(Membership::Join))),
        "banned Bob from the room"
    );
    assert_eq!(
        show(&member("$8", BOB, BOB, Membership::Knock, None)),
        "knocked"
    );

    let mut both = rename("$9", BOB, "bob", "Bobby");
    if let Payload::Member(m) = &mut both.payload {
        m.avatar_url = Some("mxc://example.org/a".to_string());
    }
    assert_eq!(
        show(&both),
        "changed their display name to Bobby and updated the avatar"
    );
}

#[test]
fn display_text_covers_room_state_and_messages() {
    let tl = MemoryTimeline::new(ROOM, ME);
    let show = |p: Payload| render::display_text(&Event::new("$e", BOB, p), &tl);

    assert_eq!(
        show(Payload::RoomTopic { topic: String::new() }),
        "cleared the topic"
    );
    assert_eq!(
        show(Payload::RoomName { name: "Lounge".to_string() }),
        "set the room name to: Lounge"
    );
    assert_eq!(
        show(Payload::RoomAliases {
            aliases: vec!["#a:x".to_string(), "#b:x".to_string()]
        }),
        "set aliases to: #a:x, #b:x"
    );
    assert_eq!(show(Payload::Encryption), "activated End-to-End Encryption");
    assert_eq!(
        show(Payload::Other { event_type: "x.y".to_string() }),
        "Unknown Event"
    );
    assert_eq!(
        show(Payload::Message(MessageContent::html(
            "Hi Bob!",
            r#"Hi <a href="https://matrix.to/#/@bob:example.org">Bob</a>!"#
        ))),
        r#"Hi <b class="user-pill">Bob</b>!"#
    );
    assert_eq!(
        show(Payload::Message(MessageContent::file(
            MessageKind::File,
            "",
            FileInfo::default()
        ))),
        "a file"
    );
}

#[test]
fn message_body_strips_reply_fallback() {
    let reply = msg(
        "$r",
        BOB,
        "> <@alice:example.org> original\n> second line\n\nthe actual reply",
    );
    assert_eq!(render::message_body(&reply), "the actual reply");
    assert_eq!(render::message_body(&msg("$m", BOB, "plain")), "plain");
}

#[test]
#[should_panic]
fn completion_without_announcement_fails_loudly() {
    let mut notifier = ChangeNotifier::<TimelineField>::new();
    notifier.end(1);
}

#[test]
#[should_panic]
fn content_change_outside_the_row_space_fails_loudly() {
    let mut notifier = ChangeNotifier::<TimelineField>::new();
    notifier.reset(2);
    notifier.row_changed(2, Fields::All);
}

#[test]
#[should_panic]
fn row_count_mismatch_after_completion_fails_loudly() {
    let mut notifier = ChangeNotifier::<TimelineField>::new();
    notifier.reset(2);
    notifier.begin(StructuralChange::Insert { first: 0, last: 0 });
    notifier.end(2);
}

#[test]
fn randomized_mutations_preserve_the_row_partition() {
    let (mut tl, mut proj, rec) = attached(numbered(4, BOB));
    let mut rng = Lcg::new(0x5eed);
    let mut consumer_rows = proj.row_count(&tl);
    let mut next_id = 0usize;

    for _ in 0..400 {
        next_id += 1;
        let id = alloc::format!("$r{next_id}");
        match rng.gen_range_usize(0, 6) {
            0 => {
                let n = rng.gen_range_usize(1, 4);
                let events = (0..n)
                    .map(|i| msg(&alloc::format!("{id}.{i}"), BOB, "n"))
                    .collect();
                tl.add_new_messages(&mut proj, events);
            }
            1 => {
                let n = rng.gen_range_usize(1, 4);
                let events = (0..n)
                    .map(|i| msg(&alloc::format!("{id}.{i}"), ME, "h"))
                    .collect();
                tl.add_historical_messages(&mut proj, events);
            }
            2 | 3 => {
                tl.add_pending(&mut proj, msg("", ME, "p"), at(14));
            }
            4 if tl.pending_count() > 0 => {
                let offset = rng.gen_range_usize(0, tl.pending_count());
                tl.merge_pending(&mut proj, offset, &id);
            }
            5 if tl.pending_count() > 0 => {
                let offset = rng.gen_range_usize(0, tl.pending_count());
                tl.discard_pending(&mut proj, offset);
            }
            _ => {}
        }

        for change in rec.take() {
            match change {
                ModelChange::Done { change, row_count } => {
                    consumer_rows = change.apply_to(consumer_rows).unwrap_or(row_count);
                    assert_eq!(consumer_rows, row_count);
                }
                ModelChange::ContentChanged { last, .. } => assert!(last < consumer_rows),
                ModelChange::AboutTo(_) => {}
            }
        }

        let p = tl.pending_count();
        let t = tl.timeline_size();
        assert_eq!(proj.row_count(&tl), p + t);
        assert_eq!(consumer_rows, p + t);
        for row in 0..p + t {
            match proj.row(&tl, row) {
                Some(RowEvent::Pending(e)) => {
                    assert!(row < p);
                    assert_eq!(Some(e), tl.pending_event(p - 1 - row));
                }
                Some(RowEvent::Committed { event, offset }) => {
                    assert!(row >= p);
                    assert_eq!(offset, row - p);
                    assert_eq!(Some(event), tl.timeline_event(offset));
                }
                None => panic!("row {row} unresolved"),
            }
        }
        assert!(proj.row(&tl, p + t).is_none());
    }
}

// Roster

fn roster_with(n: usize) -> (MemoryRooms, RosterProjection, Vec<RoomHandle>, ChangeRecorder<RoomField>) {
    let mut rooms = MemoryRooms::new();
    let handles = (0..n)
        .map(|i| {
            let mut room = MemoryRoom::new(alloc::format!("!r{i}:x"), alloc::format!("Room {i}"), ME);
            room.notification_count = i as u32;
            rooms.insert(room)
        })
        .collect();
    let mut roster = RosterProjection::default();
    let rec = ChangeRecorder::new();
    roster.subscribe(rec.listener());
    roster.set_connection(Some(&rooms));
    rec.take();
    (rooms, roster, handles, rec)
}

fn collect_events(roster: &mut RosterProjection) -> Rc<RefCell<Vec<RosterEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    roster.subscribe_events(move |e| sink.borrow_mut().push(e.clone()));
    log
}

#[test]
fn roster_loads_rooms_and_aggregates_notifications() {
    let (rooms, roster, handles, _rec) = roster_with(4);
    assert_eq!(roster.row_count(), 4);
    assert_eq!(roster.room_at(2), Some(handles[2]));
    assert_eq!(roster.room_at(4), None);
    assert_eq!(roster.notification_count(), 6);
    assert_eq!(
        roster.data(&rooms, 1, RoomField::Name),
        Some(RoomValue::Text("Room 1".to_string()))
    );
    assert_eq!(
        roster.data(&rooms, 3, RoomField::NotificationCount),
        Some(RoomValue::Count(Some(3)))
    );
}

#[test]
fn categories_follow_priority_order() {
    let mut room = MemoryRoom::new("!a:x", "A", ME);
    room.join_state = JoinState::Invite;
    room.favourite = true;
    assert_eq!(RoomCategory::of(&room), RoomCategory::Invited);
    room.join_state = JoinState::Join;
    room.direct = true;
    assert_eq!(RoomCategory::of(&room), RoomCategory::Favorite);
    room.favourite = false;
    room.low_priority = true;
    assert_eq!(RoomCategory::of(&room), RoomCategory::Direct);
    room.direct = false;
    assert_eq!(RoomCategory::of(&room), RoomCategory::Deprioritized);
    room.low_priority = false;
    assert_eq!(RoomCategory::of(&room), RoomCategory::Normal);
    assert_eq!(RoomCategory::Direct.name(), "Direct Messages");
}

#[test]
fn join_state_label_reports_upgrades() {
    let (mut rooms, mut roster, handles, _rec) = roster_with(1);
    assert_eq!(
        roster.data(&rooms, 0, RoomField::JoinState),
        Some(RoomValue::Text("join".to_string()))
    );
    rooms.update(&mut roster, handles[0], RoomSignal::JoinStateChanged, |r| {
        r.successor_id = Some("!next:x".to_string());
    });
    assert_eq!(
        roster.data(&rooms, 0, RoomField::JoinState),
        Some(RoomValue::Text("upgraded".to_string()))
    );
}

#[test]
fn replacing_a_room_substitutes_in_place() {
    let (mut rooms, mut roster, handles, rec) = roster_with(5);
    let prev = handles[3];

    let next = rooms.supersede(&mut roster, prev, MemoryRoom::new("!r3:x", "Room 3", ME));

    assert_eq!(
        rec.take(),
        vec![ModelChange::ContentChanged {
            first: 3,
            last: 3,
            fields: Fields::All
        }]
    );
    assert_eq!(roster.row_count(), 5);
    assert_eq!(roster.room_at(3), Some(next));
    assert!(!roster.is_subscribed(prev));
    assert!(roster.is_subscribed(next));

    // The superseded object's signals no longer reach the roster.
    roster.room_signal(&rooms, prev, RoomSignal::DisplayNameChanged);
    assert!(rec.is_empty());
}

#[test]
fn self_replacement_refreshes_the_row() {
    let (rooms, mut roster, handles, rec) = roster_with(3);
    roster.update_room(&rooms, handles[1], Some(handles[1]));
    assert_eq!(
        rec.take(),
        vec![ModelChange::ContentChanged {
            first: 1,
            last: 1,
            fields: Fields::All
        }]
    );
    assert_eq!(roster.row_count(), 3);
}

#[test]
fn joining_a_new_room_appends_a_row() {
    let (mut rooms, mut roster, _handles, rec) = roster_with(2);
    let events = collect_events(&mut roster);
    let h = rooms.join(&mut roster, MemoryRoom::new("!new:x", "New", ME));
    assert_eq!(
        rec.take(),
        vec![
            ModelChange::AboutTo(StructuralChange::Insert { first: 2, last: 2 }),
            ModelChange::Done {
                change: StructuralChange::Insert { first: 2, last: 2 },
                row_count: 3
            },
        ]
    );
    assert_eq!(roster.room_at(2), Some(h));
    assert_eq!(events.borrow().first(), Some(&RosterEvent::RoomAdded(h)));
}

#[test]
fn deleting_an_absent_room_is_a_no_op() {
    let (rooms, mut roster, _handles, rec) = roster_with(2);
    roster.delete_room(&rooms, RoomHandle(999));
    assert!(rec.is_empty());
    assert_eq!(roster.row_count(), 2);
}

#[test]
fn deleting_a_room_removes_its_row_and_recounts() {
    let (mut rooms, mut roster, handles, rec) = roster_with(3);
    rooms.delete(&mut roster, handles[2]);
    assert_eq!(
        rec.take(),
        vec![
            ModelChange::AboutTo(StructuralChange::Remove { first: 2, last: 2 }),
            ModelChange::Done {
                change: StructuralChange::Remove { first: 2, last: 2 },
                row_count: 2
            },
        ]
    );
    assert_eq!(roster.notification_count(), 1);
    assert!(!roster.is_subscribed(handles[2]));
}

#[test]
fn remote_message_raising_notifications_emits_one_alert() {
    let (mut rooms, mut roster, handles, _rec) = roster_with(1);
    let events = collect_events(&mut roster);

    rooms.update(&mut roster, handles[0], RoomSignal::NotificationCountChanged, |r| {
        r.names.insert(BOB.to_string(), "Bob".to_string());
        r.events.push(msg("$e", BOB, "ping"));
        r.notification_count = 1;
    });

    let alerts: Vec<RoomAlert> = events
        .borrow()
        .iter()
        .filter_map(|e| match e {
            RosterEvent::Alert(a) => Some(a.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::Message);
    assert_eq!(alerts[0].room_id, "!r0:x");
    assert_eq!(alerts[0].event_id, "$e");
    assert_eq!(alerts[0].sender_name, "Bob");
    assert_eq!(alerts[0].text, "ping");
    assert_eq!(roster.notification_count(), 1);
    assert!(
        events
            .borrow()
            .contains(&RosterEvent::NotificationCountChanged(1))
    );
}

#[test]
fn own_and_state_events_do_not_alert() {
    let (mut rooms, mut roster, handles, _rec) = roster_with(1);
    let events = collect_events(&mut roster);

    rooms.update(&mut roster, handles[0], RoomSignal::HighlightCountChanged, |r| {
        r.events.push(msg("$mine", ME, "hi"));
        r.highlight_count = 1;
    });
    rooms.update(&mut roster, handles[0], RoomSignal::HighlightCountChanged, |r| {
        r.events
            .push(Event::new("$s", BOB, Payload::RoomName { name: "n".to_string() }));
    });
    assert!(
        !events
            .borrow()
            .iter()
            .any(|e| matches!(e, RosterEvent::Alert(_)))
    );
}

fn alerts(events: &Rc<RefCell<Vec<RosterEvent>>>) -> usize {
    events
        .borrow()
        .iter()
        .filter(|e| matches!(e, RosterEvent::Alert(_)))
        .count()
}

#[test]
fn falling_counts_do_not_alert_again() {
    let (mut rooms, mut roster, handles, _rec) = roster_with(1);
    let events = collect_events(&mut roster);

    rooms.update(&mut roster, handles[0], RoomSignal::NotificationCountChanged, |r| {
        r.events.push(msg("$e", BOB, "ping"));
        r.notification_count = 2;
    });
    assert_eq!(alerts(&events), 1);

    // Read elsewhere: 2 -> 1, then an unrelated repeat of the same count.
    rooms.update(&mut roster, handles[0], RoomSignal::NotificationCountChanged, |r| {
        r.notification_count = 1;
    });
    rooms.update(&mut roster, handles[0], RoomSignal::NotificationCountChanged, |_| {});
    assert_eq!(alerts(&events), 1);
    assert_eq!(roster.notification_count(), 1);

    rooms.update(&mut roster, handles[0], RoomSignal::NotificationCountChanged, |r| {
        r.events.push(msg("$f", BOB, "again"));
        r.notification_count = 2;
    });
    assert_eq!(alerts(&events), 2);
}

#[test]
fn highlight_alerts_track_their_own_counter() {
    let (mut rooms, mut roster, handles, _rec) = roster_with(1);
    let events = collect_events(&mut roster);

    rooms.update(&mut roster, handles[0], RoomSignal::NotificationCountChanged, |r| {
        r.events.push(msg("$e", BOB, "@me ping"));
        r.notification_count = 1;
        r.highlight_count = 1;
    });
    rooms.update(&mut roster, handles[0], RoomSignal::HighlightCountChanged, |_| {});
    assert_eq!(alerts(&events), 2);
    assert!(matches!(
        events.borrow().last(),
        Some(RosterEvent::Alert(RoomAlert {
            kind: AlertKind::Highlight,
            ..
        }))
    ));

    rooms.update(&mut roster, handles[0], RoomSignal::HighlightCountChanged, |r| {
        r.highlight_count = 0;
    });
    assert_eq!(alerts(&events), 2);
}

#[test]
fn counts_known_at_load_or_replacement_do_not_alert() {
    let (mut rooms, mut roster, handles, _rec) = roster_with(3);
    let events = collect_events(&mut roster);

    // Loaded with a count of 2; a repeat signal is not an increase.
    rooms.update(&mut roster, handles[2], RoomSignal::NotificationCountChanged, |r| {
        r.events.push(msg("$e", BOB, "ping"));
    });
    assert_eq!(alerts(&events), 0);

    let mut next = MemoryRoom::new("!r2:x", "Room 2", ME);
    next.notification_count = 2;
    next.events.push(msg("$e", BOB, "ping"));
    let next = rooms.supersede(&mut roster, handles[2], next);
    rooms.update(&mut roster, next, RoomSignal::NotificationCountChanged, |_| {});
    assert_eq!(alerts(&events), 0);
}

#[test]
fn avatar_changes_only_invalidate_the_avatar() {
    let (mut rooms, mut roster, handles, rec) = roster_with(2);
    rooms.update(&mut roster, handles[1], RoomSignal::AvatarChanged, |r| {
        r.avatar_media_id = Some("example.org/avatar".to_string());
    });
    assert_eq!(
        rec.take(),
        vec![ModelChange::ContentChanged {
            first: 1,
            last: 1,
            fields: Fields::Only(vec![RoomField::Avatar])
        }]
    );
}

#[test]
fn category_visibility_is_a_reset() {
    let (rooms, mut roster, _handles, rec) = roster_with(2);
    roster.set_category_visible(RoomCategory::Normal, false);
    assert_eq!(
        rec.take(),
        vec![
            ModelChange::AboutTo(StructuralChange::Reset),
            ModelChange::Done {
                change: StructuralChange::Reset,
                row_count: 2
            },
        ]
    );
    assert!(!roster.is_category_visible(RoomCategory::Normal));
    assert!(roster.is_category_visible(RoomCategory::Favorite));
    assert_eq!(
        roster.data(&rooms, 0, RoomField::CategoryVisible),
        Some(RoomValue::Flag(false))
    );
}

#[test]
fn direct_chat_changes_refresh_named_rooms() {
    let (rooms, mut roster, _handles, rec) = roster_with(3);
    roster.direct_chats_changed(&rooms, &["!r2:x", "!unknown:x"]);
    assert_eq!(
        rec.take(),
        vec![ModelChange::ContentChanged {
            first: 2,
            last: 2,
            fields: Fields::All
        }]
    );
}

#[test]
fn last_event_summary_names_the_sender() {
    let (mut rooms, mut roster, handles, _rec) = roster_with(1);
    rooms.update(&mut roster, handles[0], RoomSignal::AddedMessages, |r| {
        r.names.insert(BOB.to_string(), "Bob".to_string());
        r.events.push(msg("$e", BOB, "hello"));
    });
    assert_eq!(
        roster.data(&rooms, 0, RoomField::LastEvent),
        Some(RoomValue::Text("Bob: hello".to_string()))
    );
}

#[test]
fn clearing_the_connection_empties_the_roster() {
    let (_rooms, mut roster, _handles, rec) = roster_with(3);
    roster.set_connection::<MemoryRooms>(None);
    assert_eq!(roster.row_count(), 0);
    assert_eq!(roster.notification_count(), 0);
    assert_eq!(
        rec.take().last(),
        Some(&ModelChange::Done {
            change: StructuralChange::Reset,
            row_count: 0
        })
    );
}
