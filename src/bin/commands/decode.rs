use std::{collections::BTreeSet, sync::Arc};
use tbtn::{
    driver::{Binding, EventSink, QueryError},
    keymap::{Action, KeyTable, LogicalKey, RegistrationPolicy},
};

/// Print events rather than sending them to an input device
struct PrintSink {
    keys: BTreeSet<LogicalKey>,
}

impl EventSink for PrintSink {
    fn report(&mut self, key: LogicalKey, action: Action) -> bool {
        if self.keys.contains(&key) {
            println!(
                "event: key:{key} keycode:{} action:{action}",
                key.keycode_name()
            );
            true
        } else {
            false
        }
    }
}

pub fn decode(args: &crate::Decode, table: Arc<KeyTable>, policy: RegistrationPolicy) {
    let keys = table.registered_keys(policy);

    for status in &args.status {
        let status = *status;

        let mut binding = Binding::new(
            "decode",
            table.clone(),
            move || -> Result<u64, QueryError> { Ok(status) },
            PrintSink { keys: keys.clone() },
        );

        binding.handle(args.notification);
    }
}
