#![allow(unused_macros)]

macro_rules! cfg_exporter {
    ($($item:item)*) => {
        $(
            #[cfg(feature = "exporter")]
            #[cfg_attr(docsrs, doc(cfg(feature = "exporter")))]
            $item
        )*
    }
}

macro_rules! cfg_redis {
    ($($item:item)*) => {
        $(
            #[cfg(feature = "store_redis")]
            #[cfg_attr(docsrs, doc(cfg(feature = "store_redis")))]
            $item
        )*
    }
}
