//! Driver bindings: each attached device gets its own [`Binding`] which
//! queries the firmware after a button notification and reports the
//! decoded event to the input sink.

use crate::{
    decode::{classify, Notification, UnrecognizedStatus},
    keymap::{Action, KeyEvent, KeyTable, LogicalKey, RegistrationPolicy},
};
use log::{error, info, warn};
use std::{
    collections::{BTreeSet, HashMap},
    io,
    sync::Arc,
};
use thiserror::Error;

/// ACPI hardware ids handled by this driver
pub const SUPPORTED_IDS: [&str; 2] = ["MAT002A", "MAT002B"];

/// A device found on the platform bus
#[derive(PartialEq, Eq, Debug, Default, Clone)]
pub struct Device {
    /// Bus id, e.g. MAT002A:00
    pub bus_id: String,
    /// Hardware id, e.g. MAT002A
    pub hid: String,
    /// Path of the device in the ACPI namespace
    pub path: String,
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("firmware returned {0}")]
    Firmware(String),
    #[error("malformed reply {0:?}")]
    Malformed(String),
}

/// Fetch the current button status from firmware
pub trait FirmwareQuery {
    fn query_status(&mut self) -> Result<u64, QueryError>;
}

impl<F> FirmwareQuery for F
where
    F: FnMut() -> Result<u64, QueryError>,
{
    fn query_status(&mut self) -> Result<u64, QueryError> {
        self()
    }
}

/// Receives decoded button events. Returns false if the event could not be
/// delivered, e.g. the key is not registered.
pub trait EventSink {
    fn report(&mut self, key: LogicalKey, action: Action) -> bool;
}

/// Reasons a notification did not produce an event. None of these are fatal.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("unknown notification {0:#x}")]
    UnrecognizedNotification(u32),
    #[error("failed to query status: {0}")]
    QueryFailure(#[from] QueryError),
    #[error("{0}")]
    UnrecognizedStatus(#[from] UnrecognizedStatus),
    #[error("failed to report {event} for status {raw:#x}")]
    DeliveryFailure { raw: u64, event: KeyEvent },
}

/// State for a single attached device
pub struct Binding<Q, S> {
    name: String,
    table: Arc<KeyTable>,
    query: Q,
    sink: S,
}

impl<Q: FirmwareQuery, S: EventSink> Binding<Q, S> {
    pub fn new(name: &str, table: Arc<KeyTable>, query: Q, sink: S) -> Self {
        Binding {
            name: name.to_owned(),
            table,
            query,
            sink,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Process a notification code through to the sink
    pub fn notify(&mut self, code: u32) -> Result<KeyEvent, DriverError> {
        if classify(code) == Notification::Ignore {
            return Err(DriverError::UnrecognizedNotification(code));
        }

        let raw = self.query.query_status()?;

        let event = self.table.resolve(raw)?;

        if self.sink.report(event.key, event.action) {
            Ok(event)
        } else {
            Err(DriverError::DeliveryFailure { raw, event })
        }
    }

    /// Like [`Binding::notify`], but log the outcome rather than return it
    pub fn handle(&mut self, code: u32) -> Option<KeyEvent> {
        match self.notify(code) {
            Ok(event) => {
                info!("{}: reported {event}", self.name);
                Some(event)
            }
            Err(e @ DriverError::UnrecognizedNotification(_)) => {
                info!("{}: {e}", self.name);
                None
            }
            Err(e @ DriverError::QueryFailure(_)) => {
                error!("{}: {e}", self.name);
                None
            }
            Err(e) => {
                warn!("{}: {e}", self.name);
                None
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum BindError {
    #[error("{0}: unsupported hardware id {1}")]
    Unsupported(String, String),
    #[error("{0}: already bound")]
    AlreadyBound(String),
    #[error("{0}: {1}")]
    Io(String, io::Error),
}

/// Callbacks from the platform bus
pub trait PlatformDriver {
    fn add(&mut self, device: &Device) -> Result<(), BindError>;
    fn remove(&mut self, bus_id: &str);
    fn notify(&mut self, bus_id: &str, code: u32);
}

/// Creates the firmware query and input sink for a newly added device
pub type Connect<Q, S> = Box<dyn FnMut(&Device, &BTreeSet<LogicalKey>) -> io::Result<(Q, S)>>;

/// Driver for TOUGHPAD A1/A2 buttons, holding one binding per device
pub struct TbtnDriver<Q, S> {
    table: Arc<KeyTable>,
    policy: RegistrationPolicy,
    connect: Connect<Q, S>,
    bindings: HashMap<String, Binding<Q, S>>,
}

impl<Q: FirmwareQuery, S: EventSink> TbtnDriver<Q, S> {
    /// The connect function creates the firmware query and the input sink
    /// for a device, with the given keys registered.
    pub fn new(table: Arc<KeyTable>, policy: RegistrationPolicy, connect: Connect<Q, S>) -> Self {
        TbtnDriver {
            table,
            policy,
            connect,
            bindings: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn binding(&self, bus_id: &str) -> Option<&Binding<Q, S>> {
        self.bindings.get(bus_id)
    }

    pub fn bus_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.bindings.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl<Q: FirmwareQuery, S: EventSink> PlatformDriver for TbtnDriver<Q, S> {
    fn add(&mut self, device: &Device) -> Result<(), BindError> {
        if !SUPPORTED_IDS.contains(&device.hid.as_str()) {
            return Err(BindError::Unsupported(
                device.bus_id.clone(),
                device.hid.clone(),
            ));
        }

        if self.bindings.contains_key(&device.bus_id) {
            return Err(BindError::AlreadyBound(device.bus_id.clone()));
        }

        let keys = self.table.registered_keys(self.policy);

        let (query, sink) =
            (self.connect)(device, &keys).map_err(|e| BindError::Io(device.bus_id.clone(), e))?;

        self.bindings.insert(
            device.bus_id.clone(),
            Binding::new(&device.bus_id, self.table.clone(), query, sink),
        );

        info!("{}: input device registered for {}", device.bus_id, device.hid);

        Ok(())
    }

    fn remove(&mut self, bus_id: &str) {
        if self.bindings.remove(bus_id).is_some() {
            info!("{bus_id}: device removed");
        }
    }

    fn notify(&mut self, bus_id: &str, code: u32) {
        match self.bindings.get_mut(bus_id) {
            Some(binding) => {
                binding.handle(code);
            }
            None => warn!("{bus_id}: received notify for uninitialized device"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    /// Sink that only accepts registered keys
    #[derive(Default)]
    struct RecordingSink {
        registered: BTreeSet<LogicalKey>,
        events: Rc<RefCell<Vec<KeyEvent>>>,
    }

    impl EventSink for RecordingSink {
        fn report(&mut self, key: LogicalKey, action: Action) -> bool {
            if self.registered.contains(&key) {
                self.events.borrow_mut().push(KeyEvent { key, action });
                true
            } else {
                false
            }
        }
    }

    fn binding<Q: FirmwareQuery>(query: Q) -> Binding<Q, RecordingSink> {
        Binding::new(
            "MAT002A:00",
            Arc::new(KeyTable::default()),
            query,
            RecordingSink {
                registered: BTreeSet::from(LogicalKey::ALL),
                ..Default::default()
            },
        )
    }

    #[test]
    fn notify_press_and_release() {
        let mut statuses = vec![0x42u64, 0x43, 0x38, 0x39];
        let mut b = binding(move || -> Result<u64, QueryError> { Ok(statuses.pop().unwrap()) });

        let events: Vec<_> = (0..4).map(|_| b.notify(0x80).unwrap()).collect();

        assert_eq!(
            events,
            [
                KeyEvent {
                    key: LogicalKey::Button1,
                    action: Action::Pressed
                },
                KeyEvent {
                    key: LogicalKey::Button1,
                    action: Action::Released
                },
                KeyEvent {
                    key: LogicalKey::Button2,
                    action: Action::Pressed
                },
                KeyEvent {
                    key: LogicalKey::Button2,
                    action: Action::Released
                },
            ]
        );
        assert_eq!(*b.sink().events.borrow(), events);
    }

    #[test]
    fn ignored_notification_does_not_query() {
        let mut queried = false;

        {
            let mut b = binding(|| -> Result<u64, QueryError> {
                queried = true;
                Ok(0x39)
            });

            assert!(matches!(
                b.notify(0x81),
                Err(DriverError::UnrecognizedNotification(0x81))
            ));
            assert_eq!(b.handle(0x00), None);
        }

        assert!(!queried);
    }

    #[test]
    fn errors_are_not_fatal() {
        let mut b = binding(|| -> Result<u64, QueryError> {
            Err(QueryError::Firmware(String::from("AE_NOT_FOUND")))
        });

        let e = b.notify(0x80).unwrap_err();
        assert_eq!(
            format!("{e}"),
            "failed to query status: firmware returned AE_NOT_FOUND"
        );
        assert_eq!(b.handle(0x80), None);

        let mut b = binding(|| -> Result<u64, QueryError> { Ok(0x3a) });

        let e = b.notify(0x80).unwrap_err();
        assert!(matches!(
            e,
            DriverError::UnrecognizedStatus(UnrecognizedStatus(0x3a))
        ));
        assert_eq!(b.handle(0x80), None);
        assert!(b.sink().events.borrow().is_empty());
    }

    #[test]
    fn delivery_failure() {
        let mut b = Binding::new(
            "MAT002B:00",
            Arc::new(KeyTable::default()),
            || -> Result<u64, QueryError> { Ok(0x43) },
            RecordingSink {
                registered: BTreeSet::from([LogicalKey::Button1]),
                ..Default::default()
            },
        );

        let e = b.notify(0x80).unwrap_err();

        assert_eq!(format!("{e}"), "failed to report A2 pressed for status 0x43");
        assert_eq!(b.handle(0x80), None);
    }

    /// Firmware which always returns the same status
    struct FixedStatus(u64);

    impl FirmwareQuery for FixedStatus {
        fn query_status(&mut self) -> Result<u64, QueryError> {
            Ok(self.0)
        }
    }

    fn driver(
        policy: RegistrationPolicy,
        status: u64,
        events: Rc<RefCell<Vec<KeyEvent>>>,
    ) -> TbtnDriver<FixedStatus, RecordingSink> {
        TbtnDriver::new(
            Arc::new(KeyTable::default()),
            policy,
            Box::new(move |_: &Device, keys: &BTreeSet<LogicalKey>| -> io::Result<_> {
                Ok((
                    FixedStatus(status),
                    RecordingSink {
                        registered: keys.clone(),
                        events: events.clone(),
                    },
                ))
            }),
        )
    }

    #[test]
    fn both_policies_deliver_press_and_release() {
        for policy in [
            RegistrationPolicy::PressEntries,
            RegistrationPolicy::AllEntries,
        ] {
            for (raw, key, action) in [
                (0x39, LogicalKey::Button1, Action::Pressed),
                (0x38, LogicalKey::Button1, Action::Released),
                (0x43, LogicalKey::Button2, Action::Pressed),
                (0x42, LogicalKey::Button2, Action::Released),
            ] {
                let events = Rc::new(RefCell::new(Vec::new()));
                let mut d = driver(policy, raw, events.clone());

                let device = Device {
                    bus_id: String::from("MAT002A:00"),
                    hid: String::from("MAT002A"),
                    path: String::from("\\_SB_.TBTN"),
                };

                d.add(&device).unwrap();
                d.notify("MAT002A:00", 0x80);

                assert_eq!(*events.borrow(), [KeyEvent { key, action }], "{policy:?}");
            }
        }
    }

    #[test]
    fn driver_bindings() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut d = driver(RegistrationPolicy::default(), 0x39, events.clone());

        let e = d
            .add(&Device {
                bus_id: String::from("PNP0C0C:00"),
                hid: String::from("PNP0C0C"),
                path: String::from("\\_SB_.PWRB"),
            })
            .unwrap_err();
        assert_eq!(format!("{e}"), "PNP0C0C:00: unsupported hardware id PNP0C0C");
        assert!(d.is_empty());

        for bus_id in ["MAT002B:00", "MAT002A:00"] {
            d.add(&Device {
                bus_id: bus_id.to_owned(),
                hid: bus_id[..7].to_owned(),
                ..Default::default()
            })
            .unwrap();
        }

        assert!(matches!(
            d.add(&Device {
                bus_id: String::from("MAT002A:00"),
                hid: String::from("MAT002A"),
                ..Default::default()
            }),
            Err(BindError::AlreadyBound(_))
        ));

        assert_eq!(d.bus_ids(), ["MAT002A:00", "MAT002B:00"]);

        // notifications for devices without a binding are dropped
        d.notify("MAT002A:01", 0x80);
        assert!(events.borrow().is_empty());

        d.notify("MAT002B:00", 0x80);
        d.remove("MAT002B:00");
        d.notify("MAT002B:00", 0x80);

        assert_eq!(events.borrow().len(), 1);
        assert!(d.binding("MAT002B:00").is_none());
        assert_eq!(d.binding("MAT002A:00").unwrap().name(), "MAT002A:00");
    }
}
