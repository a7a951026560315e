pub fn default_freeze_seconds() -> u64 {
    30 * 60
}

pub fn default_max_maturity_future_seconds() -> u64 {
    30 * 24 * 3600
}

pub fn default_max_fair_price_age_seconds() -> u64 {
    60
}

pub fn default_emergency_grace_seconds() -> u64 {
    3 * 24 * 3600
}

pub fn default_protocol_fee_rate() -> f64 {
    0.01
}

pub fn default_frontend_share() -> f64 {
    0.5
}

pub fn default_ticket_fee() -> u64 {
    500_000
}

pub fn default_sample_size() -> u32 {
    30
}

pub fn default_current_price_max_delay_seconds() -> u64 {
    20 * 60
}

pub fn default_risk_free_yearly_rate() -> f64 {
    0.06
}

pub fn default_max_steps_too_old() -> u32 {
    6
}

/// Interest conversion uses a 360-day year
pub fn default_year_seconds() -> u64 {
    360 * 24 * 3600
}

pub fn default_settle_delay_seconds() -> u64 {
    60
}

pub fn default_page_size() -> u32 {
    1000
}

pub fn default_timeout_seconds() -> u64 {
    30
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}
