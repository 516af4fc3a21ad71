use cipher::{BlockDecrypt, BlockEncrypt, BlockSizeUser, generic_array::GenericArray};

pub trait MarshalAsn1 {
    type Error;

    // Return the DER encoding of the instance.
    fn marshal_asn1(&self) -> Result<Vec<u8>, Self::Error>;
}

pub trait UnmarshalAsn1: Sized {
    type Error;
    fn unmarshal_asn1(data: &[u8]) -> Result<Self, Self::Error>;
}

pub trait Block {
    fn block_size(&self) -> usize;

    // Encrypt as many whole blocks of in_out as possible.
    // Returns the number of bytes encrypted.
    fn encrypt_inplace(&self, in_out: &mut [u8]) -> usize;
    fn decrypt_inplace(&self, in_out: &mut [u8]) -> usize;
}

// Every RustCrypto block cipher (AES, DES, 3DES) is a Block.
impl<C: BlockEncrypt + BlockDecrypt> Block for C {
    fn block_size(&self) -> usize {
        <C as BlockSizeUser>::block_size()
    }

    fn encrypt_inplace(&self, in_out: &mut [u8]) -> usize {
        let block_size = <C as BlockSizeUser>::block_size();
        let mut n = 0;
        for chunk in in_out.chunks_exact_mut(block_size) {
            BlockEncrypt::encrypt_block(self, GenericArray::from_mut_slice(chunk));
            n += block_size;
        }
        n
    }

    fn decrypt_inplace(&self, in_out: &mut [u8]) -> usize {
        let block_size = <C as BlockSizeUser>::block_size();
        let mut n = 0;
        for chunk in in_out.chunks_exact_mut(block_size) {
            BlockDecrypt::decrypt_block(self, GenericArray::from_mut_slice(chunk));
            n += block_size;
        }
        n
    }
}
