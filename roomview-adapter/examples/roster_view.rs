use roomview::memory::{MemoryRoom, MemoryRooms};
use roomview::{Event, MessageContent, Payload, RoomSignal, RosterEvent, RosterProjection};
use roomview_adapter::{AlertBackend, AlertManager, RoomSortOrder, SortFilterRoster};

use std::cell::RefCell;
use std::rc::Rc;

struct StdoutBackend(u32);

impl AlertBackend for StdoutBackend {
    fn show(&mut self, summary: &str, body: &str, _icon: Option<&str>) -> u32 {
        self.0 += 1;
        println!("[alert #{}] {summary}: {body}", self.0);
        self.0
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomview=debug,roomview_adapter=debug".into()),
        )
        .init();

    // Example: a categorized room list with alerts.
    let me = "@me:example.org";
    let mut rooms = MemoryRooms::new();
    let lounge = rooms.insert(MemoryRoom::new("!lounge:x", "Lounge", me));
    let mut bob = MemoryRoom::new("!bob:x", "Bob", me);
    bob.direct = true;
    rooms.insert(bob);
    let mut news = MemoryRoom::new("!news:x", "News", me);
    news.low_priority = true;
    rooms.insert(news);

    let events = Rc::new(RefCell::new(Vec::new()));
    let mut roster = RosterProjection::default();
    let sink = Rc::clone(&events);
    roster.subscribe_events(move |e: &RosterEvent| sink.borrow_mut().push(e.clone()));
    roster.set_connection(Some(&rooms));

    let mut view = SortFilterRoster::new(RoomSortOrder::Categories);
    view.rebuild(&roster, &rooms);
    for row in 0..view.row_count() {
        let Some(source_row) = view.source_row(row) else {
            continue;
        };
        println!("{row}: {:?}", roster.category(&rooms, source_row));
    }

    let mut alerts = AlertManager::new(StdoutBackend(0));
    rooms.update(&mut roster, lounge, RoomSignal::NotificationCountChanged, |r| {
        r.events.push(Event::new(
            "$ping",
            "@carol:x",
            Payload::Message(MessageContent::text("are you there?")),
        ));
        r.notification_count = 1;
    });
    for event in events.borrow_mut().drain(..) {
        if let Some(id) = alerts.handle(&event) {
            println!("clicked: {:?}", alerts.action_invoked(id, "default"));
        }
    }
    println!("total notifications: {}", roster.notification_count());
}
