// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! Logical data types of a resolved query plan.

use std::fmt;

use crate::exec::block::ElementType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    Integer,
    Long,
    UnsignedLong,
    Double,
    Keyword,
    Text,
    Ip,
    Datetime,
    DateNanos,
    Version,
    GeoPoint,
    CartesianPoint,
    GeoShape,
    CartesianShape,
    CounterInteger,
    CounterLong,
    CounterDouble,
    /// Calendar span literal such as `1 month`; only valid as a function argument.
    DatePeriod,
    /// Fixed span literal such as `1 hour`; only valid as a function argument.
    TimeDuration,
    Null,
    Unsupported,
}

impl DataType {
    pub fn type_name(&self) -> &'static str {
        match self {
            DataType::Boolean => "boolean",
            DataType::Integer => "integer",
            DataType::Long => "long",
            DataType::UnsignedLong => "unsigned_long",
            DataType::Double => "double",
            DataType::Keyword => "keyword",
            DataType::Text => "text",
            DataType::Ip => "ip",
            DataType::Datetime => "datetime",
            DataType::DateNanos => "date_nanos",
            DataType::Version => "version",
            DataType::GeoPoint => "geo_point",
            DataType::CartesianPoint => "cartesian_point",
            DataType::GeoShape => "geo_shape",
            DataType::CartesianShape => "cartesian_shape",
            DataType::CounterInteger => "counter_integer",
            DataType::CounterLong => "counter_long",
            DataType::CounterDouble => "counter_double",
            DataType::DatePeriod => "date_period",
            DataType::TimeDuration => "time_duration",
            DataType::Null => "null",
            DataType::Unsupported => "unsupported",
        }
    }

    /// Counters are numeric in storage but excluded here: they only feed
    /// time-series functions.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Integer | DataType::Long | DataType::UnsignedLong | DataType::Double
        )
    }

    pub fn is_string(&self) -> bool {
        matches!(self, DataType::Keyword | DataType::Text)
    }

    pub fn is_counter(&self) -> bool {
        matches!(
            self,
            DataType::CounterInteger | DataType::CounterLong | DataType::CounterDouble
        )
    }

    pub fn is_date(&self) -> bool {
        matches!(self, DataType::Datetime | DataType::DateNanos)
    }

    /// Types that can be materialized in a result row.
    pub fn is_representable(&self) -> bool {
        !matches!(
            self,
            DataType::DatePeriod | DataType::TimeDuration | DataType::Unsupported
        )
    }

    /// Non-numeric types with an ordering, comparable to themselves only.
    pub fn is_ordered_non_numeric(&self) -> bool {
        self.is_string()
            || self.is_date()
            || matches!(
                self,
                DataType::Ip
                    | DataType::Version
                    | DataType::GeoPoint
                    | DataType::CartesianPoint
                    | DataType::GeoShape
                    | DataType::CartesianShape
            )
    }

    /// Whether a value of `self` compares with a value of `other` without a cast.
    pub fn is_compatible_with(&self, other: DataType) -> bool {
        *self == other
            || (self.is_string() && other.is_string())
            || (self.is_date() && other.is_date())
    }

    /// Block element type used to execute values of this type.
    pub fn element_type(&self) -> Option<ElementType> {
        Some(match self {
            DataType::Boolean => ElementType::Boolean,
            DataType::Integer | DataType::CounterInteger => ElementType::Int,
            DataType::Long
            | DataType::UnsignedLong
            | DataType::Datetime
            | DataType::DateNanos
            | DataType::CounterLong => ElementType::Long,
            DataType::Double | DataType::CounterDouble => ElementType::Double,
            DataType::Keyword
            | DataType::Text
            | DataType::Ip
            | DataType::Version
            | DataType::GeoPoint
            | DataType::CartesianPoint
            | DataType::GeoShape
            | DataType::CartesianShape => ElementType::BytesRef,
            DataType::Null => ElementType::Null,
            DataType::DatePeriod | DataType::TimeDuration | DataType::Unsupported => {
                return None;
            }
        })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}
