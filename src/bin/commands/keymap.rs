use tbtn::keymap::KeyTable;

pub fn keymap(table: &KeyTable) {
    print!("{table}");
}
