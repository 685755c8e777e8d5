pub mod ranges {
    macro_rules! param {
        ($name:expr) => {
            crate::value::Value::Param(crate::value::Parameter::of($name).unwrap())
        };
    }

    macro_rules! equal {
        ($value:expr) => {
            crate::range::Range::equal_to($value)
        };
    }

    macro_rules! less_than {
        ($value:expr) => {
            crate::range::Range::less_than($value)
        };
    }

    macro_rules! less_than_or_equal {
        ($value:expr) => {
            crate::range::Range::less_than_or_equal($value)
        };
    }

    macro_rules! greater_than {
        ($value:expr) => {
            crate::range::Range::greater_than($value)
        };
    }

    macro_rules! greater_than_or_equal {
        ($value:expr) => {
            crate::range::Range::greater_than_or_equal($value)
        };
    }

    pub(crate) use equal;
    pub(crate) use greater_than;
    pub(crate) use greater_than_or_equal;
    pub(crate) use less_than;
    pub(crate) use less_than_or_equal;
    pub(crate) use param;
}

pub mod cubes {
    macro_rules! cube {
        ($($dimension:expr => $range:expr),* $(,)?) => {{
            let cube = crate::cube::Cube::new();
            $(let cube = cube.with($dimension, $range);)*
            cube
        }};
    }

    pub(crate) use cube;
}
