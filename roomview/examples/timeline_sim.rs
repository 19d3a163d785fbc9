// Example: drive a timeline projection through local echo, sync and backfill.
use chrono::Utc;
use roomview::memory::MemoryTimeline;
use roomview::{
    Event, MessageContent, ModelChange, Payload, TimelineField, TimelineOptions,
    TimelineProjection,
};

fn msg(id: &str, sender: &str, body: &str) -> Event {
    Event::new(id, sender, Payload::Message(MessageContent::text(body))).with_timestamp(Utc::now())
}

fn dump(proj: &TimelineProjection, tl: &MemoryTimeline) {
    for row in 0..proj.row_count(tl) {
        let text = |field| match proj.data(tl, row, field) {
            Some(roomview::TimelineValue::Text(s)) => s,
            _ => String::new(),
        };
        println!(
            "  {row:>2} {:<8} {:<18} {:?}",
            text(TimelineField::EventId),
            text(TimelineField::Display),
            proj.status(tl, row),
        );
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomview=debug".into()),
        )
        .init();

    let me = "@me:example.org";
    let bob = "@bob:example.org";
    let mut tl = MemoryTimeline::new("!lounge:example.org", me).with_events([
        msg("$1", bob, "morning"),
        msg("$2", bob, "anyone around?"),
    ]);

    let mut proj = TimelineProjection::new(TimelineOptions::new().with_scan_window(50));
    proj.subscribe(|change: &ModelChange<TimelineField>| match change {
        ModelChange::ContentChanged { .. } => {}
        other => println!("change: {other:?}"),
    });
    proj.set_source(Some(&tl));

    // Local echo, then a second one that the server acknowledges first.
    tl.add_pending(&mut proj, msg("", me, "hi bob"), Utc::now());
    tl.add_pending(&mut proj, msg("", me, "one sec"), Utc::now());
    println!("with two pending events:");
    dump(&proj, &tl);

    tl.merge_pending(&mut proj, 1, "$3");
    tl.merge_pending(&mut proj, 0, "$4");
    println!("after both were acknowledged:");
    dump(&proj, &tl);

    tl.add_historical_messages(&mut proj, vec![msg("$0", bob, "(older)")]);
    tl.move_read_marker(&mut proj, "$2");
    println!("after backfill:");
    dump(&proj, &tl);
}
