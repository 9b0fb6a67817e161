//! crates/casebook_core/src/catalog.rs
//!
//! Fixed choice lists used by the program: office locations, the catalog of
//! service descriptions, allowed fee and discount amounts, and the optional
//! demographic answers.

use rust_decimal::Decimal;

/// Location recorded when none was chosen.
pub const NO_CITY: &str = "No City Chosen";

/// Office locations, alphabetical, followed by [`NO_CITY`].
pub const LOCATIONS: &[&str] = &[
    "Anderson",
    "Bloomington",
    "Crawfordsville",
    "Delphi",
    "Elwood",
    "Evansville",
    "Indianapolis/Franklin",
    "Lafayette",
    "Muncie",
    "Rennselaer",
    "Terre Haute",
    "Vincennes",
    "Virtual",
    NO_CITY,
];

// Some entries carry a trailing space; existing rows were stored that way.
pub const SERVICES: &[&str] = &[
    "Attended Class Session",
    "Attended Class Session-Zoom",
    "DCS Attended Class",
    "DCS Attended Class-Zoom",
    "0 Absences Remaining",
    "1 Absence Remaining",
    "2 Absences Remaining ",
    "Absence Excused By Program Director",
    "Absence Excused",
    "Absent From Class",
    "Active Status Reinstated",
    "Admin File Review",
    "DV Assessment",
    "Attended Extra Class",
    "Attended Free Class",
    "Attended Intake Orientation",
    "Bad Check Fee",
    "Class Cancelled this Week",
    "Completed Program",
    "Complied with Referral Source Requirements",
    "Convenience Fee",
    "Court Appearance Subpoenaed",
    "Co-Facilitated Class Session",
    "DCS Court Appearance Subpoenaed",
    "DCS FCM Team Meeting",
    "DCS Individual Session",
    "DCS Intake Orientation 1.0 Hour",
    "DCS Non Credit Class Arrived Late ",
    "DCS Non Credit Class Left Early ",
    "DCS Non Credit Class Rule Violation",
    "DCS Referral Ended / Withdrawn",
    "Error",
    "Emailed Participant",
    "Excused Absence Court",
    "Excused Absence Incarcerated",
    "Excused Absence Medical",
    "Excused Absence Military Duty",
    "Facilitated Class Session",
    "Individual Office Discussion",
    "Late Fee",
    "No Show- Client Never Enrolled",
    "No Show - Scheduled Appointment",
    "Non Credit - Arrived Late",
    "Non Credit - Came to Office Intoxicated",
    "Non Credit - Deferred",
    "Non Credit - Left Early",
    "Non Credit - Program Rule Violated",
    "Non Credit - Short 12 Step Reports",
    "Non Credit- Disruptive Behavior in Class",
    "Non Credit-Zoom",
    "Observed Class ",
    "Other (specify)",
    "Payment - No Session Attended",
    "Payment Refund",
    "Previous Balance Brought Forward",
    "Program Extended",
    "Received New Referral",
    "Received Notebook",
    "Refused to Attend Intake Orientation",
    "Refused to Sign Enrollment Agreement",
    "Returned Check Fee",
    "Scheduled Appointment",
    "Telephone Discussion",
    "Telephone Message Left",
    "Threatened Suicide 911 Notified",
    "Transferred From Another Program",
    "Transferred to Another Program",
    "Texts/ Emails Sent to Client",
    "Texts/Emails Sent to Referral Source",
    "Text/Email Received from Client",
    "Unable to Contact Client",
    "Unbillable Team Meeting",
    "Violated Abusive Behavior Instructed to Leave",
    "Violated Admitted Alcohol or Drug Use",
    "Violated Disruptive Behavior in Class",
    "Violated Excessive Absences",
    "Violated New Abuse Allegations",
    "Violated New Criminal Charge",
    "Violated Positive Alcohol/Drug Test",
    "Violated Program Rules",
    "Violated Quit Attending",
    "Violated Refused to Comply with Staff",
    "Violated Rules - Abuse Outside of Class",
    "Volunteer Work Credit",
    "Waiting for Client to Come and Enroll",
];

/// Fee amounts in whole dollars.
pub const FEES: &[i64] = &[0, 2, 4, 8, 25, 30, 35, 40];

/// Discount amounts in whole dollars.
pub const DISCOUNTS: &[i64] = &[0, 5, 10, 15, 20, 25, 30, 35, 40];

pub const ETHNICITIES: &[&str] = &[
    "White",
    "Black or African-American",
    "Latino or Hispanic",
    "American Indian or Alaskan Native",
    "Asian",
    "Native Hawaiian or other Pacific Islander",
    "Two or more",
    "Prefer not to say",
];

pub const GENDERS: &[&str] = &["Male", "Female", "Non-binary", "Prefer not to say"];

pub const LANGUAGES: &[&str] = &[
    "English",
    "Spanish",
    "Chinese",
    "French",
    "Some other language",
    "Prefer not to say",
];

pub const RELATIONSHIPS: &[&str] = &["Married", "Single", "In a relationship", "Prefer not to say"];

pub const EMPLOYMENTS: &[&str] = &[
    "Employed Full-time",
    "Employed Part-time",
    "Not Employed",
    "Retired",
    "Disabled or Unable to work",
    "Prefer not to say",
];

pub fn is_location(value: &str) -> bool {
    LOCATIONS.contains(&value)
}

pub fn is_fee(amount: Decimal) -> bool {
    FEES.iter().any(|f| Decimal::from(*f) == amount)
}

pub fn is_discount(amount: Decimal) -> bool {
    DISCOUNTS.iter().any(|d| Decimal::from(*d) == amount)
}
