//! On-screen labels used by dialers for the SIM chooser
use phf::phf_map;

/// Label text to SIM slot index (0-based).
///
/// Keys are lowercase; match with [`mentions_slot`].
pub static SIM_LABELS: phf::Map<&'static str, u8> = phf_map! {
    "sim 1" => 0,
    "sim1" => 0,
    "sim card 1" => 0,
    "slot 1" => 0,
    "kartu sim 1" => 0,
    "tarjeta sim 1" => 0,
    "cartão sim 1" => 0,
    "carte sim 1" => 0,
    "sim-karte 1" => 0,
    "sim-карта 1" => 0,
    "卡1" => 0,
    "卡 1" => 0,
    "sim 2" => 1,
    "sim2" => 1,
    "sim card 2" => 1,
    "slot 2" => 1,
    "kartu sim 2" => 1,
    "tarjeta sim 2" => 1,
    "cartão sim 2" => 1,
    "carte sim 2" => 1,
    "sim-karte 2" => 1,
    "sim-карта 2" => 1,
    "卡2" => 1,
    "卡 2" => 1,
};

/// All labels naming `slot`, longest first so that "sim card 1" is tried
/// before the bare "sim1".
pub fn labels_for_slot(slot: u8) -> Vec<&'static str> {
    let mut labels: Vec<&'static str> = SIM_LABELS
        .entries()
        .filter(|(_, s)| **s == slot)
        .map(|(label, _)| *label)
        .collect();
    labels.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
    labels
}

/// Does `text` mention a label for `slot`?
///
/// Dialers often decorate the label ("SIM 1 · Telkomsel"), so this is a
/// containment test.
pub fn mentions_slot(text: &str, slot: u8) -> bool {
    let lowered = text.to_lowercase();
    labels_for_slot(slot)
        .iter()
        .any(|label| lowered.contains(label))
}
