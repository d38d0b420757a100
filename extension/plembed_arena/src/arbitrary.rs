//! Arbitrary implementations for [`Key`].

use proptest::{
    num::u64,
    prelude::{Arbitrary, BoxedStrategy, Strategy},
};

use crate::Key;

impl<T: 'static> Arbitrary for Key<T> {
    type Strategy = BoxedStrategy<Self>;
    type Parameters = ();

    fn arbitrary_with((): Self::Parameters) -> Self::Strategy {
        (u64::ANY, u64::ANY)
            .prop_map(|(index, generation)| Self::new(index, generation))
            .boxed()
    }
}
