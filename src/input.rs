//! Report button events through a uinput virtual input device

use crate::{
    driver::EventSink,
    keymap::{Action, LogicalKey},
};
use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AttributeSet, BusType, EventType, InputEvent, InputId, Key,
};
use log::warn;
use std::{collections::BTreeSet, io};

pub const DEVICE_NAME: &str = "TBTN A1/A2 Buttons";

pub struct UinputSink {
    device: VirtualDevice,
    keys: BTreeSet<LogicalKey>,
}

impl UinputSink {
    /// Create the input device with the given keys registered
    pub fn new(keys: &BTreeSet<LogicalKey>) -> io::Result<Self> {
        let mut attributes = AttributeSet::<Key>::new();

        for key in keys {
            attributes.insert(Key::new(key.keycode()));
        }

        let device = VirtualDeviceBuilder::new()?
            .name(DEVICE_NAME)
            .input_id(InputId::new(BusType::BUS_HOST, 0, 0, 0))
            .with_keys(&attributes)?
            .build()?;

        Ok(UinputSink {
            device,
            keys: keys.clone(),
        })
    }
}

impl EventSink for UinputSink {
    fn report(&mut self, key: LogicalKey, action: Action) -> bool {
        if !self.keys.contains(&key) {
            return false;
        }

        let event = InputEvent::new(EventType::KEY, key.keycode(), action.value());

        match self.device.emit(&[event]) {
            Ok(()) => true,
            Err(e) => {
                warn!("uinput: {e}");
                false
            }
        }
    }
}
