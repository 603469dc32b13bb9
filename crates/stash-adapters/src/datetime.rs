//! Fechas, horas y duraciones (chrono).
//!
//! - `datetime.datetime` v1: `{ "datetime": <ISO 8601> }`
//! - `datetime.time` v1: `{ "time": <ISO 8601> }`
//! - `datetime.timedelta` v1: `{ "days": <int>, "seconds": <int>, "microseconds": <int> }`
//!
//! La duración se normaliza como `days` con signo, `0 <= seconds < 86400` y
//! `0 <= microseconds < 10^6`.

use std::str::FromStr;

use chrono::{FixedOffset, NaiveDateTime, NaiveTime, SecondsFormat};
use log::debug;
use serde::{Deserialize, Serialize};
use stash_core::{impl_object, Codec, CodecError, Context, Document, Envelope, EnvelopeSpec, Registry, Value};

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_DAY: i64 = 86_400 * MICROS_PER_SECOND;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime(pub chrono::DateTime<FixedOffset>);
impl_object!(DateTime);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Time(pub NaiveTime);
impl_object!(Time);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeDelta(pub chrono::TimeDelta);
impl_object!(TimeDelta);

#[derive(Debug, Serialize, Deserialize)]
struct DateTimeFields {
    datetime: String,
}

impl EnvelopeSpec for DateTimeFields {
    const TAG: &'static str = "datetime.datetime";
}

#[derive(Debug, Serialize, Deserialize)]
struct TimeFields {
    time: String,
}

impl EnvelopeSpec for TimeFields {
    const TAG: &'static str = "datetime.time";
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct TimeDeltaFields {
    days: i64,
    seconds: i64,
    microseconds: i64,
}

impl EnvelopeSpec for TimeDeltaFields {
    const TAG: &'static str = "datetime.timedelta";

    fn validate(&self) -> Result<(), String> {
        if !(0..86_400).contains(&self.seconds) {
            return Err(format!("seconds out of range: {}", self.seconds));
        }
        if !(0..MICROS_PER_SECOND).contains(&self.microseconds) {
            return Err(format!("microseconds out of range: {}", self.microseconds));
        }
        Ok(())
    }
}

impl TimeDeltaFields {
    fn from_delta(delta: &chrono::TimeDelta) -> Option<Self> {
        let total = delta.num_microseconds()?;
        let rem = total.rem_euclid(MICROS_PER_DAY);
        Some(Self { days: total.div_euclid(MICROS_PER_DAY),
                    seconds: rem / MICROS_PER_SECOND,
                    microseconds: rem % MICROS_PER_SECOND })
    }

    fn to_delta(&self) -> Option<chrono::TimeDelta> {
        chrono::TimeDelta::try_days(self.days)?.checked_add(&chrono::TimeDelta::try_seconds(self.seconds)?)?
                                               .checked_add(&chrono::TimeDelta::microseconds(self.microseconds))
    }
}

pub fn register(reg: &mut Registry) {
    reg.register_encoder("datetime", encode)
       .register_decoder(DateTimeFields::TAG, DateTimeFields::VERSION, decode_datetime_v1)
       .register_decoder(TimeFields::TAG, TimeFields::VERSION, decode_time_v1)
       .register_decoder(TimeDeltaFields::TAG, TimeDeltaFields::VERSION, decode_timedelta_v1);
}

fn encode(value: &Value, ctx: &Context, _codec: &Codec) -> Result<Option<Document>, CodecError> {
    let envelope = if let Some(DateTime(dt)) = value.downcast_ref::<DateTime>() {
        DateTimeFields { datetime: dt.to_rfc3339_opts(SecondsFormat::AutoSi, false) }.into_envelope()?
    } else if let Some(Time(t)) = value.downcast_ref::<Time>() {
        TimeFields { time: t.format("%H:%M:%S%.f").to_string() }.into_envelope()?
    } else if let Some(TimeDelta(d)) = value.downcast_ref::<TimeDelta>() {
        TimeDeltaFields::from_delta(d).ok_or_else(|| CodecError::unsupported("chrono::TimeDelta (out of range)", ctx.json_path()))?
                                      .into_envelope()?
    } else {
        return Ok(None);
    };
    Ok(Some(envelope.into_document()))
}

fn decode_datetime_v1(env: Envelope, _ctx: &Context, _codec: &Codec) -> Result<Value, CodecError> {
    let fields = DateTimeFields::from_envelope(&env)?;
    let dt = match chrono::DateTime::parse_from_rfc3339(&fields.datetime) {
        Ok(dt) => dt,
        // Sin offset: se interpreta como UTC.
        Err(_) => {
            let naive = NaiveDateTime::from_str(&fields.datetime).map_err(|e| env.malformed(format!("invalid datetime `{}`: {e}", fields.datetime)))?;
            debug!("datetime without offset at {}, assuming UTC", env.path);
            naive.and_utc().fixed_offset()
        }
    };
    Ok(Value::object(DateTime(dt)))
}

fn decode_time_v1(env: Envelope, _ctx: &Context, _codec: &Codec) -> Result<Value, CodecError> {
    let fields = TimeFields::from_envelope(&env)?;
    let t = NaiveTime::from_str(&fields.time).map_err(|e| env.malformed(format!("invalid time `{}`: {e}", fields.time)))?;
    Ok(Value::object(Time(t)))
}

fn decode_timedelta_v1(env: Envelope, _ctx: &Context, _codec: &Codec) -> Result<Value, CodecError> {
    let fields = TimeDeltaFields::from_envelope(&env)?;
    let delta = fields.to_delta().ok_or_else(|| env.malformed("duration out of range"))?;
    Ok(Value::object(TimeDelta(delta)))
}
