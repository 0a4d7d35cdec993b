//! Built-in identifier prefix tables.

/// Kenyan mobile number prefixes (country code 254 plus operator block), per
/// <https://en.wikipedia.org/wiki/Telephone_numbers_in_Kenya#Mobile_operators>.
///
/// Each prefix is followed by a 6-digit subscriber number.
pub const KENYA_MOBILE: &[&str] = &[
    "254110", "254111", "254112", "254113", "254114", "254115",
    "254116", "254117", "254118", "254119", "254701", "254702",
    "254703", "254704", "254705", "254706", "254707", "254708",
    "254709", "254710", "254711", "254712", "254713", "254714",
    "254715", "254716", "254717", "254718", "254719", "254720",
    "254721", "254722", "254723", "254724", "254725", "254726",
    "254727", "254728", "254729", "254740", "254741", "254742",
    "254743", "254745", "254746", "254748", "254757", "254758",
    "254759", "254768", "254769", "254790", "254791", "254792",
    "254793", "254794", "254795", "254796", "254797", "254798",
    "254799",
];
